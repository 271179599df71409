#[actix_web::main]
async fn main() -> std::io::Result<()> {
    warehouse_chat_lib::run().await
}
