use utoipa::OpenApi;

fn main() {
    let doc = chat_api::routes::ApiDoc::openapi()
        .to_pretty_json()
        .expect("failed to render OpenAPI document");
    let out = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("openapi/chat-api.json");
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent).expect("failed to create output directory");
    }
    std::fs::write(&out, doc).expect("failed to write OpenAPI document");
    println!("Wrote {}", out.display());
}
