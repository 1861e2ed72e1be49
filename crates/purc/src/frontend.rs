//! The parsing pipeline and the stateful orchestrator that caches its
//! results.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use purc_cache::{CacheError, CacheKey, DocumentCache, SourceKind};
use purc_config::ParserConfig;
use purc_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink, ErrorKind};
use purc_source::{FileId, Reader, Span};
use purc_tokenizer::{HvmlToken, Tokenizer};
use purc_vdom::Generator;

use crate::document::LoadedDocument;
use crate::error::LoadError;
use crate::fetcher::UrlFetcher;

/// Parses a stream into a document: binds a tokenizer and generator to
/// the source, pushes tokens until EOF or a lexical abort, then finishes
/// the generator. Performs no caching — [`Frontend`]'s methods wrap this
/// for the cached entry points.
pub fn load_from_stream<R: Read>(
    mut stream: R,
    source_name: impl Into<PathBuf>,
    max_ejson_depth: u32,
) -> Result<LoadedDocument, LoadError> {
    let path = source_name.into();
    let mut bytes = Vec::new();
    stream
        .read_to_end(&mut bytes)
        .map_err(|source| LoadError::Io { path: path.clone(), source })?;
    parse_bytes(&bytes, max_ejson_depth)
}

fn parse_bytes(bytes: &[u8], max_ejson_depth: u32) -> Result<LoadedDocument, LoadError> {
    let file = FileId::from_raw(0);
    let text = std::str::from_utf8(bytes).map_err(|e| LoadError::Lexical {
        diagnostic: Some(Diagnostic::error(
            DiagnosticCode::new(ErrorKind::InvalidUtf8Character),
            "source is not valid UTF-8",
            Span::new(file, e.valid_up_to() as u32, e.valid_up_to() as u32),
        )),
    })?;
    let source_len = text.len();
    let sink = DiagnosticSink::new();
    let mut reader = Reader::new(file, text);
    let document = {
        let mut tokenizer = Tokenizer::new(&mut reader, file, &sink, max_ejson_depth);
        let mut generator = Generator::new(&sink);
        loop {
            match tokenizer.next_token() {
                Some(HvmlToken::Eof) => {
                    generator.push_token(&mut tokenizer, HvmlToken::Eof);
                    break;
                }
                Some(token) => generator.push_token(&mut tokenizer, token),
                None => {
                    return Err(LoadError::Lexical { diagnostic: tokenizer.last_error().cloned() });
                }
            }
        }
        generator
            .end()
            .expect("push_token is never called again after this end() call")
    };
    Ok(LoadedDocument { document, diagnostics: sink.take_all(), source_len })
}

/// Owns the document cache and parser configuration behind
/// `load_from_string`/`load_from_file`/`load_from_url`.
///
/// The document cache is process-wide and its mutation (find-or-insert)
/// must serialize; a single `Frontend` shared behind an `Arc` across
/// threads gives exactly that, since the only lock held is `cache`'s and
/// it's released before parsing.
pub struct Frontend {
    config: ParserConfig,
    cache: Mutex<DocumentCache<LoadedDocument>>,
}

impl Frontend {
    /// Creates a frontend with the given parser configuration.
    pub fn new(config: ParserConfig) -> Self {
        let cache = DocumentCache::new(config.cache_soft_byte_limit);
        Self { config, cache: Mutex::new(cache) }
    }

    /// The parser configuration this frontend was created with.
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parses `src`, consulting and populating the document cache keyed by
    /// MD5 of `src`'s bytes.
    pub fn load_from_string(
        &self,
        source_name: impl Into<PathBuf>,
        src: &str,
    ) -> Result<Arc<LoadedDocument>, LoadError> {
        let key = CacheKey::from_bytes(src.as_bytes());
        if let Some(hit) = self.cache.lock().unwrap().get(key) {
            return Ok(hit);
        }
        let loaded = load_from_stream(src.as_bytes(), source_name, self.config.max_ejson_depth)?;
        Ok(self.cache_insert(key, loaded, SourceKind::StringOrFile))
    }

    /// Reads and parses `path`, consulting and populating the document
    /// cache keyed by MD5 of the file's content.
    pub fn load_from_file(&self, path: &Path) -> Result<Arc<LoadedDocument>, LoadError> {
        let bytes = fs::read(path).map_err(|source| LoadError::Io { path: path.to_path_buf(), source })?;
        let key = CacheKey::from_bytes(&bytes);
        if let Some(hit) = self.cache.lock().unwrap().get(key) {
            return Ok(hit);
        }
        let loaded = load_from_stream(bytes.as_slice(), path.to_path_buf(), self.config.max_ejson_depth)?;
        Ok(self.cache_insert(key, loaded, SourceKind::StringOrFile))
    }

    /// Fetches `url` through `fetcher` and parses the response body,
    /// consulting and populating the document cache keyed by the URL
    /// string itself rather than by the fetched content.
    pub fn load_from_url(&self, url: &str, fetcher: &dyn UrlFetcher) -> Result<Arc<LoadedDocument>, LoadError> {
        let key = CacheKey::from_bytes(url.as_bytes());
        if let Some(hit) = self.cache.lock().unwrap().get(key) {
            return Ok(hit);
        }
        let response = fetcher.fetch(url, self.config.fetch_timeout_secs).map_err(LoadError::Fetch)?;
        if !(200..300).contains(&response.status) {
            return Err(LoadError::Fetch(CacheError::Fetch {
                url: url.to_string(),
                reason: format!("unexpected status {}", response.status),
            }));
        }
        let loaded = load_from_stream(response.body.as_slice(), url.to_string(), self.config.max_ejson_depth)?;
        Ok(self.cache_insert(key, loaded, SourceKind::Url))
    }

    fn cache_insert(&self, key: CacheKey, loaded: LoadedDocument, kind: SourceKind) -> Arc<LoadedDocument> {
        let ttl = match kind {
            SourceKind::Url => Duration::from_secs(self.config.url_cache_ttl_secs),
            SourceKind::StringOrFile => Duration::from_secs(self.config.string_cache_ttl_secs),
        };
        let byte_size = loaded.byte_size();
        let mut cache = self.cache.lock().unwrap();
        if byte_size > self.config.cache_soft_byte_limit {
            // Too large to live in the cache even alone; hand it back
            // directly rather than inserting-then-immediately-evicting it.
            return Arc::new(loaded);
        }
        cache.insert(key, loaded, ttl, byte_size);
        cache
            .get(key)
            .expect("an entry at or under the soft limit cannot be its own eviction victim")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smallest_valid_document() {
        let loaded = load_from_stream("<hvml></hvml>".as_bytes(), "inline", 64).unwrap();
        assert!(!loaded.has_errors());
        let hvml = loaded.document.hvml_element().unwrap();
        assert!(loaded.document.node(hvml).children.is_empty());
    }

    #[test]
    fn invalid_utf8_is_a_lexical_error() {
        let err = load_from_stream(&b"<hvml>\xff</hvml>"[..], "inline", 64).unwrap_err();
        assert!(matches!(err, LoadError::Lexical { .. }));
    }

    #[test]
    fn frontend_caches_identical_strings() {
        let frontend = Frontend::new(ParserConfig::default());
        let a = frontend.load_from_string("a.hvml", "<hvml></hvml>").unwrap();
        let b = frontend.load_from_string("a.hvml", "<hvml></hvml>").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn frontend_distinguishes_different_sources() {
        let frontend = Frontend::new(ParserConfig::default());
        let a = frontend.load_from_string("a.hvml", "<hvml></hvml>").unwrap();
        let b = frontend.load_from_string("b.hvml", "<hvml><body></body></hvml>").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn frontend_loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.hvml");
        fs::write(&path, "<hvml></hvml>").unwrap();
        let frontend = Frontend::new(ParserConfig::default());
        let loaded = frontend.load_from_file(&path).unwrap();
        assert!(!loaded.has_errors());
    }

    struct StaticFetcher(&'static str);

    impl UrlFetcher for StaticFetcher {
        fn fetch(&self, _url: &str, _timeout_s: u32) -> Result<crate::FetchResponse, CacheError> {
            Ok(crate::FetchResponse { status: 200, body: self.0.as_bytes().to_vec(), mime: None })
        }
    }

    #[test]
    fn frontend_loads_from_url() {
        let frontend = Frontend::new(ParserConfig::default());
        let fetcher = StaticFetcher("<hvml></hvml>");
        let loaded = frontend.load_from_url("https://example.org/doc.hvml", &fetcher).unwrap();
        assert!(!loaded.has_errors());
    }

    struct FailingFetcher;

    impl UrlFetcher for FailingFetcher {
        fn fetch(&self, url: &str, _timeout_s: u32) -> Result<crate::FetchResponse, CacheError> {
            Err(CacheError::Fetch { url: url.to_string(), reason: "connection refused".to_string() })
        }
    }

    #[test]
    fn frontend_surfaces_fetch_errors() {
        let frontend = Frontend::new(ParserConfig::default());
        let err = frontend.load_from_url("https://example.org/doc.hvml", &FailingFetcher).unwrap_err();
        assert!(matches!(err, LoadError::Fetch(_)));
    }

    struct NotFoundFetcher;

    impl UrlFetcher for NotFoundFetcher {
        fn fetch(&self, _url: &str, _timeout_s: u32) -> Result<crate::FetchResponse, CacheError> {
            Ok(crate::FetchResponse { status: 404, body: Vec::new(), mime: None })
        }
    }

    #[test]
    fn frontend_rejects_non_2xx_status() {
        let frontend = Frontend::new(ParserConfig::default());
        let err = frontend.load_from_url("https://example.org/missing", &NotFoundFetcher).unwrap_err();
        assert!(matches!(err, LoadError::Fetch(_)));
    }
}
