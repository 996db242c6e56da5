//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::io::Write;

pub const SKY_TEXT: &str =
    "The sky is blue. Grass is green. The sky at dusk turns orange.";

/// Minimal docx (ZIP) with one `w:p` paragraph per entry.
pub fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
        body
    );
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

/// Config TOML using the offline hashed embedder and no external tools.
pub fn test_config(backend_url: &str) -> String {
    format!(
        r#"[backend]
url = "{}"
model = "test-model"
timeout_secs = 5

[retrieval]
top_k = 2

[embedding]
provider = "hashed"
dims = 256

[extract]
ocr = false
"#,
        backend_url
    )
}
