use once_cell::sync::Lazy;
use regex::Regex;

static THINK_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<think>[\s\S]*?</think>|<think\s*/>").unwrap());

static REASONING_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<reasoning>[\s\S]*?</reasoning>").unwrap());

/// Some models echo the final template line before answering.
static ANSWER_LABEL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?i:respons dalam bahasa alami)\s*:\s*").unwrap());

static MULTIPLE_NEWLINES_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Cleans a natural-language answer before it is shown and stored as a turn.
pub fn clean_llm_response(response: &str) -> String {
    let cleaned = THINK_TAG_PATTERN.replace_all(response, "");
    let cleaned = REASONING_TAG_PATTERN.replace_all(&cleaned, "");
    let cleaned = cleaned.trim();
    let cleaned = ANSWER_LABEL_PATTERN.replace(cleaned, "");

    MULTIPLE_NEWLINES_PATTERN
        .replace_all(cleaned.trim(), "\n\n")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_think_tags() {
        let input = "<think>Hitung dulu...</think>Pendidikan terbanyak adalah S1.";
        assert_eq!(clean_llm_response(input), "Pendidikan terbanyak adalah S1.");
    }

    #[test]
    fn test_clean_self_closing_think() {
        assert_eq!(clean_llm_response("<think />Ada 12 pegawai."), "Ada 12 pegawai.");
    }

    #[test]
    fn test_clean_reasoning_tags() {
        let input = "<reasoning>Internal reasoning</reasoning>Final answer";
        assert_eq!(clean_llm_response(input), "Final answer");
    }

    #[test]
    fn test_strips_echoed_answer_label() {
        let input = "  Respons dalam Bahasa Alami: Ada 12 pegawai berstatus ASN.";
        assert_eq!(clean_llm_response(input), "Ada 12 pegawai berstatus ASN.");
    }

    #[test]
    fn test_label_in_the_middle_is_kept() {
        let input = "Jawaban: lihat Respons dalam Bahasa Alami: di atas";
        assert_eq!(clean_llm_response(input), input);
    }

    #[test]
    fn test_clean_multiple_newlines() {
        assert_eq!(clean_llm_response("Line 1\n\n\n\n\nLine 2"), "Line 1\n\nLine 2");
    }

    #[test]
    fn test_clean_preserves_normal_text() {
        let input = "Pegawai dengan status ASN berjumlah 12 orang.";
        assert_eq!(clean_llm_response(input), input);
    }
}
