use crate::domain::error::{AppError, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([a-z_]+)\}").unwrap());

const SQL_TEMPLATE: &str = r#"Anda adalah seorang analis data di sebuah perusahaan. Anda sedang berinteraksi dengan seorang pengguna yang menanyakan pertanyaan tentang database perusahaan.
Berdasarkan skema tabel di bawah ini, tuliskan query SQL yang akan menjawab pertanyaan pengguna. Perhatikan juga riwayat percakapan dalam menyusun query.

<SCHEMA>{schema}</SCHEMA>

Riwayat Percakapan: {chat_history}

Tuliskan hanya query SQL-nya saja dan tidak ada teks lain. Jangan membungkus query SQL dengan teks tambahan, bahkan backticks sekalipun.

Contoh:
Pertanyaan: Pegawai yang memiliki status pegawai asn?
SQL Query: SELECT * FROM public.tb_pegawai WHERE status_pegawai = 'asn';
Pertanyaan: Bagaimana proporsi bidang pegawai berdasarkan tabel struktur organisasi?
SQL Query: SELECT Department,(EmployeeCount * 100.0 / (SELECT SUM(EmployeeCount) FROM StrukturOrganisasi)) AS ProportionPercentage FROM StrukturOrganisasi ORDER BY ProportionPercentage DESC;
Pertanyaan: Apa pendidikan terakhir yang paling banyak dimiliki pegawai?
SQL Query: SELECT HighestEducation, COUNT(*) AS Total FROM Pendidikan GROUP BY HighestEducation ORDER BY Total DESC LIMIT 1;

Sekarang giliran Anda:

Pertanyaan: {question}
SQL Query:"#;

const ANSWER_TEMPLATE: &str = r#"Anda adalah seorang analis data di sebuah perusahaan. Anda sedang berinteraksi dengan seorang pengguna yang menanyakan pertanyaan tentang database perusahaan.
Berdasarkan skema tabel di bawah ini, pertanyaan, query SQL, dan respons SQL, tuliskan respons dalam bahasa alami.
<SCHEMA>{schema}</SCHEMA>

Riwayat Percakapan: {chat_history}
Query SQL: <SQL>{query}</SQL>
Pertanyaan Pengguna: {question}
Respons SQL: {response}
Respons dalam Bahasa Alami:"#;

/// A fixed prompt text with `{name}` placeholders.
pub struct PromptTemplate {
    name: &'static str,
    text: &'static str,
}

impl PromptTemplate {
    pub const fn new(name: &'static str, text: &'static str) -> Self {
        Self { name, text }
    }

    pub fn variables(&self) -> Vec<&'static str> {
        PLACEHOLDER_PATTERN
            .captures_iter(self.text)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect()
    }

    /// Single-pass substitution: values are inserted verbatim and never re-expanded.
    pub fn render(&self, values: &[(&str, &str)]) -> Result<String> {
        let lookup = |key: &str| {
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| *value)
        };

        if let Some(missing) = self.variables().into_iter().find(|key| lookup(*key).is_none()) {
            return Err(AppError::ValidationError(format!(
                "Template '{}' has no value for '{}'",
                self.name, missing
            )));
        }

        Ok(PLACEHOLDER_PATTERN
            .replace_all(self.text, |caps: &Captures| {
                lookup(&caps[1]).unwrap_or_default().to_string()
            })
            .into_owned())
    }
}

pub const SQL_PROMPT: PromptTemplate = PromptTemplate::new("sql", SQL_TEMPLATE);
pub const ANSWER_PROMPT: PromptTemplate = PromptTemplate::new("answer", ANSWER_TEMPLATE);

pub struct PromptEngine;

impl PromptEngine {
    /// Prompt asking the model for a bare SQL statement answering `question`.
    pub fn build_sql_prompt(schema: &str, chat_history: &str, question: &str) -> Result<String> {
        SQL_PROMPT.render(&[
            ("schema", schema),
            ("chat_history", chat_history),
            ("question", question),
        ])
    }

    /// Prompt asking the model to explain `response` (rows or an error) in natural language.
    pub fn build_answer_prompt(
        schema: &str,
        chat_history: &str,
        query: &str,
        question: &str,
        response: &str,
    ) -> Result<String> {
        ANSWER_PROMPT.render(&[
            ("schema", schema),
            ("chat_history", chat_history),
            ("query", query),
            ("question", question),
            ("response", response),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = "CREATE TABLE tb_pegawai(status_pegawai text)";
    const QUESTION: &str = "Pegawai yang memiliki status pegawai asn?";

    #[test]
    fn test_sql_prompt_snapshot() {
        let history = "AI: Hello! Aku Asistenmu!\nHuman: Pegawai yang memiliki status pegawai asn?";
        let prompt = PromptEngine::build_sql_prompt(SCHEMA, history, QUESTION).unwrap();

        let expected = r#"Anda adalah seorang analis data di sebuah perusahaan. Anda sedang berinteraksi dengan seorang pengguna yang menanyakan pertanyaan tentang database perusahaan.
Berdasarkan skema tabel di bawah ini, tuliskan query SQL yang akan menjawab pertanyaan pengguna. Perhatikan juga riwayat percakapan dalam menyusun query.

<SCHEMA>CREATE TABLE tb_pegawai(status_pegawai text)</SCHEMA>

Riwayat Percakapan: AI: Hello! Aku Asistenmu!
Human: Pegawai yang memiliki status pegawai asn?

Tuliskan hanya query SQL-nya saja dan tidak ada teks lain. Jangan membungkus query SQL dengan teks tambahan, bahkan backticks sekalipun.

Contoh:
Pertanyaan: Pegawai yang memiliki status pegawai asn?
SQL Query: SELECT * FROM public.tb_pegawai WHERE status_pegawai = 'asn';
Pertanyaan: Bagaimana proporsi bidang pegawai berdasarkan tabel struktur organisasi?
SQL Query: SELECT Department,(EmployeeCount * 100.0 / (SELECT SUM(EmployeeCount) FROM StrukturOrganisasi)) AS ProportionPercentage FROM StrukturOrganisasi ORDER BY ProportionPercentage DESC;
Pertanyaan: Apa pendidikan terakhir yang paling banyak dimiliki pegawai?
SQL Query: SELECT HighestEducation, COUNT(*) AS Total FROM Pendidikan GROUP BY HighestEducation ORDER BY Total DESC LIMIT 1;

Sekarang giliran Anda:

Pertanyaan: Pegawai yang memiliki status pegawai asn?
SQL Query:"#;

        assert_eq!(prompt, expected);
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let first = PromptEngine::build_sql_prompt(SCHEMA, "AI: Halo", QUESTION).unwrap();
        let second = PromptEngine::build_sql_prompt(SCHEMA, "AI: Halo", QUESTION).unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_answer_prompt_embeds_query_and_response() {
        let prompt = PromptEngine::build_answer_prompt(
            SCHEMA,
            "AI: Halo",
            "SELECT COUNT(*) FROM tb_pegawai WHERE status_pegawai = 'asn';",
            QUESTION,
            "[(12,)]",
        )
        .unwrap();

        assert!(prompt.contains(
            "Query SQL: <SQL>SELECT COUNT(*) FROM tb_pegawai WHERE status_pegawai = 'asn';</SQL>\n"
        ));
        assert!(prompt.contains("Pertanyaan Pengguna: Pegawai yang memiliki status pegawai asn?\n"));
        assert!(prompt.contains("Respons SQL: [(12,)]\n"));
        assert!(prompt.ends_with("Respons dalam Bahasa Alami:"));
    }

    #[test]
    fn test_values_are_not_re_expanded() {
        let prompt = PromptEngine::build_sql_prompt(SCHEMA, "", "apa isi {schema}?").unwrap();
        assert!(prompt.contains("Pertanyaan: apa isi {schema}?\nSQL Query:"));
        assert_eq!(prompt.matches(SCHEMA).count(), 1);
    }

    #[test]
    fn test_template_variables() {
        assert_eq!(SQL_PROMPT.variables(), vec!["schema", "chat_history", "question"]);
        assert_eq!(
            ANSWER_PROMPT.variables(),
            vec!["schema", "chat_history", "query", "question", "response"]
        );
    }

    #[test]
    fn test_missing_value_is_validation_error() {
        let err = SQL_PROMPT
            .render(&[("schema", SCHEMA), ("question", QUESTION)])
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(msg) if msg.contains("chat_history")));
    }
}
