use std::sync::Arc;

use safe_template::{
    CompiledTemplate, CompilerBuilder, Document, ExtractedContent, FsStorage, IdClass,
    MessageQueue, Storage, TemplateError,
};
use tempfile::TempDir;
use tokio::sync::Mutex as TokioMutex;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// In-memory storage recording every write with its content type.
#[derive(Clone)]
#[allow(clippy::type_complexity)]
struct MemoryStorage {
    files: Arc<TokioMutex<Vec<(String, String, Vec<u8>)>>>,
}

impl MemoryStorage {
    fn new() -> Self {
        Self {
            files: Arc::new(TokioMutex::new(Vec::new())),
        }
    }
}

impl Storage for MemoryStorage {
    async fn put(&self, key: &str, content: &[u8], content_type: &str) -> safe_template::Result<()> {
        self.files.lock().await.push((
            key.to_string(),
            content_type.to_string(),
            content.to_vec(),
        ));
        Ok(())
    }
}

/// Storage that always fails -- for testing error paths.
struct FailingStorage;

impl Storage for FailingStorage {
    async fn put(
        &self,
        _key: &str,
        _content: &[u8],
        _content_type: &str,
    ) -> safe_template::Result<()> {
        Err(TemplateError::StorageWrite("simulated failure".into()))
    }
}

fn compile(html: &str) -> CompiledTemplate {
    let compiler = CompilerBuilder::new()
        .id_class(IdClass::Dynamic)
        .build()
        .unwrap();
    let mut mq = MessageQueue::new();
    compiler.compile(Document::parse_fragment(html), &ExtractedContent::new(), &mut mq)
}

// ---------------------------------------------------------------------------
// FsStorage
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fs_storage_write_and_read() {
    let tmp = TempDir::new().unwrap();
    let storage = FsStorage::new(tmp.path());

    storage
        .put("gadget.html", b"<p>Test page</p>", "text/html")
        .await
        .unwrap();

    let read = tokio::fs::read_to_string(tmp.path().join("gadget.html"))
        .await
        .unwrap();
    assert_eq!(read, "<p>Test page</p>");
}

#[tokio::test]
async fn fs_storage_nested_paths() {
    let tmp = TempDir::new().unwrap();
    let storage = FsStorage::new(tmp.path());

    storage
        .put("gadgets/weather/v2.js", b"{}", "application/javascript")
        .await
        .unwrap();

    let path = tmp.path().join("gadgets").join("weather").join("v2.js");
    assert!(path.exists());
}

#[tokio::test]
async fn fs_storage_refuses_keys_outside_base() {
    let tmp = TempDir::new().unwrap();
    let storage = FsStorage::new(tmp.path().join("out"));

    for key in ["../escape.html", "a/../../escape.html", "/etc/escape.html"] {
        let err = storage.put(key, b"x", "text/html").await.unwrap_err();
        assert!(matches!(err, TemplateError::StorageWrite(_)), "{key}");
    }
    assert!(!tmp.path().join("escape.html").exists());
}

#[tokio::test]
async fn fs_storage_concurrent_writes() {
    let tmp = TempDir::new().unwrap();

    let mut handles = vec![];
    for i in 0..10 {
        let s = FsStorage::new(tmp.path());
        handles.push(tokio::spawn(async move {
            s.put(
                &format!("file_{i}.html"),
                format!("<p>{i}</p>").as_bytes(),
                "text/html",
            )
            .await
            .unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    for i in 0..10 {
        let content = tokio::fs::read_to_string(tmp.path().join(format!("file_{i}.html")))
            .await
            .unwrap();
        assert_eq!(content, format!("<p>{i}</p>"));
    }
}

// ---------------------------------------------------------------------------
// CompiledTemplate::save
// ---------------------------------------------------------------------------

#[tokio::test]
async fn save_writes_html_and_js() {
    let tmp = TempDir::new().unwrap();
    let storage = FsStorage::new(tmp.path());
    let out = compile(r#"<p id="greeting">Hello</p>"#);

    out.save(&storage, "hello").await.unwrap();

    let html = tokio::fs::read_to_string(tmp.path().join("hello.html"))
        .await
        .unwrap();
    let js = tokio::fs::read_to_string(tmp.path().join("hello.js"))
        .await
        .unwrap();
    assert_eq!(html, out.html());
    assert_eq!(js, out.js());
    assert!(js.contains("'greeting-' + IMPORTS___.getIdClass___()"));
}

#[tokio::test]
async fn save_uses_content_types() {
    let storage = MemoryStorage::new();
    compile("<b>static</b>")
        .save(&storage, "gadgets/static")
        .await
        .unwrap();

    let mut files = storage.files.lock().await.clone();
    files.sort();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].0, "gadgets/static.html");
    assert_eq!(files[0].1, "text/html");
    assert_eq!(files[0].2, b"<b>static</b>");
    assert_eq!(files[1].0, "gadgets/static.js");
    assert_eq!(files[1].1, "application/javascript");
    assert!(files[1].2.is_empty());
}

#[tokio::test]
async fn save_propagates_storage_errors() {
    let err = compile("<p>x</p>")
        .save(&FailingStorage, "broken")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("simulated failure"));
}
