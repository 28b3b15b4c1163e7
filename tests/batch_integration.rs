//! Integration tests for the batch controller.
//!
//! Resolvers and byte sources are in-memory fakes so every scenario runs
//! without network access.

use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mediadl_core::download::{ByteSource, OutputTemplate, SourceOpener, TransferError};
use mediadl_core::notify::{MemoryNotifier, NoticeLevel, Notifier};
use mediadl_core::orchestrator::{Downloader, ErrorKind};
use mediadl_core::postprocess::{
    InfoJsonWriter, PostProcessChain, PostProcessError, PostProcessor, ProcessContext,
};
use mediadl_core::resolver::{ResolveContext, ResolveError, Resolver, ResolverRegistry};
use mediadl_core::{Config, DownloadedItem, ResolvedItem};
use tempfile::TempDir;

type CallLog = Arc<Mutex<Vec<String>>>;

/// Claims inputs starting with `prefix`; resolves each to one item whose id
/// is the part after the prefix, unless the input is listed in `failing`.
struct ScriptedResolver {
    name: &'static str,
    prefix: &'static str,
    failing: HashSet<String>,
    suitable_calls: CallLog,
    resolve_calls: CallLog,
}

impl ScriptedResolver {
    fn new(name: &'static str, prefix: &'static str) -> Self {
        Self {
            name,
            prefix,
            failing: HashSet::new(),
            suitable_calls: Arc::default(),
            resolve_calls: Arc::default(),
        }
    }

    fn failing_on(mut self, input: &str) -> Self {
        self.failing.insert(input.to_string());
        self
    }
}

#[async_trait]
impl Resolver for ScriptedResolver {
    fn name(&self) -> &str {
        self.name
    }

    fn suitable(&self, input: &str) -> bool {
        self.suitable_calls.lock().unwrap().push(input.to_string());
        input.starts_with(self.prefix)
    }

    async fn resolve(
        &self,
        input: &str,
        _ctx: &ResolveContext<'_>,
    ) -> Result<Vec<Option<ResolvedItem>>, ResolveError> {
        self.resolve_calls.lock().unwrap().push(input.to_string());
        if self.failing.contains(input) {
            return Err(ResolveError::resolution_failed(self.name, input, "scripted failure"));
        }
        let id = input.trim_start_matches(self.prefix);
        Ok(vec![Some(ResolvedItem::new(
            id,
            format!("mem://{id}"),
            "uploader",
            format!("Title {id}"),
            "flv",
        ))])
    }
}

/// Serves `mem://<id>` as the bytes of `<id>`, or a short body for `mem://short`.
#[derive(Default)]
struct MemoryOpener {
    opened: Mutex<Vec<String>>,
}

#[async_trait]
impl SourceOpener for MemoryOpener {
    async fn open(&self, url: &str) -> Result<ByteSource, TransferError> {
        self.opened.lock().unwrap().push(url.to_string());
        if url == "mem://short" {
            return Ok(ByteSource::new(Cursor::new(vec![7u8; 900]), Some(1000)));
        }
        let body = url.trim_start_matches("mem://").as_bytes().to_vec();
        Ok(ByteSource::from_bytes(body))
    }
}

/// Fails for items whose id is `failing_id`, passes everything else through.
struct RejectingProcessor {
    failing_id: &'static str,
}

#[async_trait]
impl PostProcessor for RejectingProcessor {
    fn name(&self) -> &str {
        "rejecting"
    }

    async fn run(
        &self,
        item: DownloadedItem,
        _ctx: &ProcessContext<'_>,
    ) -> Result<Option<DownloadedItem>, PostProcessError> {
        if item.item.id() == self.failing_id {
            return Err(PostProcessError::Failed {
                processor: self.name().to_string(),
                reason: "conversion failed".to_string(),
            });
        }
        Ok(Some(item))
    }
}

fn rejecting_chain(failing_id: &'static str) -> PostProcessChain {
    let mut chain = PostProcessChain::new();
    chain.add(Box::new(RejectingProcessor { failing_id }));
    chain
}

struct Harness {
    dir: TempDir,
    opener: Arc<MemoryOpener>,
    notifier: Arc<MemoryNotifier>,
}

impl Harness {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
            opener: Arc::new(MemoryOpener::default()),
            notifier: Arc::new(MemoryNotifier::new()),
        }
    }

    fn config(&self) -> Config {
        Config {
            output_template: OutputTemplate::new(format!(
                "{}/%(id)s.%(ext)s",
                self.dir.path().display()
            )),
            ..Config::default()
        }
    }

    fn downloader(&self, config: Config, registry: ResolverRegistry, chain: PostProcessChain) -> Downloader {
        Downloader::new(
            Arc::new(config),
            registry,
            chain,
            Arc::clone(&self.opener) as Arc<dyn SourceOpener>,
            Arc::clone(&self.notifier) as Arc<dyn Notifier>,
        )
    }

    fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }
}

fn inputs(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

fn registry_of(resolvers: Vec<Arc<dyn Resolver>>) -> ResolverRegistry {
    let mut registry = ResolverRegistry::new();
    for resolver in resolvers {
        registry.register(resolver);
    }
    registry
}

#[tokio::test]
async fn test_dispatch_is_first_match() {
    let harness = Harness::new();
    let first = Arc::new(ScriptedResolver::new("first", "m:"));
    let second = Arc::new(ScriptedResolver::new("second", "m:"));
    let first_calls = Arc::clone(&first.resolve_calls);
    let second_calls = Arc::clone(&second.resolve_calls);
    let registry = registry_of(vec![first, second]);

    let outcome = harness
        .downloader(harness.config(), registry, PostProcessChain::new())
        .download_all(&inputs(&["m:a"]))
        .await
        .unwrap();

    assert_eq!(outcome.succeeded(), 1);
    assert_eq!(*first_calls.lock().unwrap(), vec!["m:a"]);
    assert!(second_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_fixed_template_with_two_inputs_aborts_before_resolving() {
    let harness = Harness::new();
    let resolver = Arc::new(ScriptedResolver::new("scripted", "m:"));
    let suitable_calls = Arc::clone(&resolver.suitable_calls);
    let resolve_calls = Arc::clone(&resolver.resolve_calls);
    let config = Config {
        output_template: OutputTemplate::new(harness.path("video.flv").display().to_string()),
        ignore_errors: true,
        ..Config::default()
    };

    let err = harness
        .downloader(config, registry_of(vec![resolver]), PostProcessChain::new())
        .download_all(&inputs(&["m:a", "m:b"]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AmbiguousDestination);
    assert!(suitable_calls.lock().unwrap().is_empty());
    assert!(resolve_calls.lock().unwrap().is_empty());
    assert!(harness.opener.opened.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_ignore_errors_continues_past_failed_input() {
    let harness = Harness::new();
    let resolver = Arc::new(ScriptedResolver::new("scripted", "m:").failing_on("m:b"));
    let config = Config {
        ignore_errors: true,
        ..harness.config()
    };

    let outcome = harness
        .downloader(config, registry_of(vec![resolver]), PostProcessChain::new())
        .download_all(&inputs(&["m:a", "m:b", "m:c"]))
        .await
        .unwrap();

    assert_eq!(outcome.succeeded(), 2);
    assert_eq!(outcome.failed(), 1);
    assert_ne!(outcome.status(), 0);
    assert!(harness.path("a.flv").exists());
    assert!(!harness.path("b.flv").exists());
    assert!(harness.path("c.flv").exists());
    assert_eq!(harness.notifier.messages(NoticeLevel::Error).len(), 1);
}

#[tokio::test]
async fn test_fail_fast_stops_at_first_failed_input() {
    let harness = Harness::new();
    let resolver = Arc::new(ScriptedResolver::new("scripted", "m:").failing_on("m:a"));
    let resolve_calls = Arc::clone(&resolver.resolve_calls);

    let err = harness
        .downloader(harness.config(), registry_of(vec![resolver]), PostProcessChain::new())
        .download_all(&inputs(&["m:a", "m:b", "m:c"]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExtractionFailure);
    assert_eq!(*resolve_calls.lock().unwrap(), vec!["m:a"]);
    assert!(harness.opener.opened.lock().unwrap().is_empty());
    assert_eq!(harness.notifier.messages(NoticeLevel::Error).len(), 1);
}

#[tokio::test]
async fn test_unclaimed_input_is_absorbed_with_ignore_errors() {
    let harness = Harness::new();
    let resolver = Arc::new(ScriptedResolver::new("scripted", "m:"));
    let config = Config {
        ignore_errors: true,
        ..harness.config()
    };

    let outcome = harness
        .downloader(config, registry_of(vec![resolver]), PostProcessChain::new())
        .download_all(&inputs(&["nobody-claims-this", "m:z"]))
        .await
        .unwrap();

    assert_eq!(outcome.failed(), 1);
    assert_eq!(outcome.succeeded(), 1);
    let errors = harness.notifier.messages(NoticeLevel::Error);
    assert!(errors[0].contains("no suitable resolver"));
}

#[tokio::test]
async fn test_short_body_is_content_length_mismatch_and_partial_file_kept() {
    let harness = Harness::new();
    let resolver = Arc::new(ScriptedResolver::new("scripted", "m:"));

    let err = harness
        .downloader(harness.config(), registry_of(vec![resolver]), PostProcessChain::new())
        .download_all(&inputs(&["m:short"]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ContentLengthMismatch);
    let written = std::fs::read(harness.path("short.flv")).unwrap();
    assert_eq!(written.len(), 900);
}

#[tokio::test]
async fn test_destination_in_missing_directories_is_created() {
    let harness = Harness::new();
    let resolver = Arc::new(ScriptedResolver::new("scripted", "m:"));
    let config = Config {
        output_template: OutputTemplate::new(format!(
            "{}/%(uploader)s/nested/%(id)s.%(ext)s",
            harness.dir.path().display()
        )),
        ..Config::default()
    };

    harness
        .downloader(config, registry_of(vec![resolver]), PostProcessChain::new())
        .download_all(&inputs(&["m:deep"]))
        .await
        .unwrap();

    let file = harness.path("uploader/nested/deep.flv");
    assert_eq!(std::fs::read_to_string(file).unwrap(), "deep");
}

#[tokio::test]
async fn test_unwritable_destination_is_reported() {
    let harness = Harness::new();
    // A regular file where a directory is needed.
    std::fs::write(harness.path("blocker"), "x").unwrap();
    let resolver = Arc::new(ScriptedResolver::new("scripted", "m:"));
    let config = Config {
        output_template: OutputTemplate::new(format!(
            "{}/blocker/%(id)s.%(ext)s",
            harness.dir.path().display()
        )),
        ignore_errors: true,
        ..Config::default()
    };

    let outcome = harness
        .downloader(config, registry_of(vec![resolver]), PostProcessChain::new())
        .download_all(&inputs(&["m:a"]))
        .await
        .unwrap();

    assert_eq!(outcome.failed(), 1);
    assert!(harness.opener.opened.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_info_json_written_after_transfer() {
    let harness = Harness::new();
    let resolver = Arc::new(ScriptedResolver::new("scripted", "m:"));
    let mut chain = PostProcessChain::new();
    chain.add(Box::new(InfoJsonWriter::new()));

    harness
        .downloader(harness.config(), registry_of(vec![resolver]), chain)
        .download_all(&inputs(&["m:meta"]))
        .await
        .unwrap();

    let raw = std::fs::read_to_string(harness.path("meta.info.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["id"], "meta");
    assert_eq!(json["title"], "Title meta");
    assert!(
        Path::new(json["filepath"].as_str().unwrap()).ends_with("meta.flv"),
        "filepath should point at the media file"
    );
}

#[tokio::test]
async fn test_overwrites_existing_file_by_default() {
    let harness = Harness::new();
    std::fs::write(harness.path("a.flv"), "stale content that is longer").unwrap();
    let resolver = Arc::new(ScriptedResolver::new("scripted", "m:"));

    harness
        .downloader(harness.config(), registry_of(vec![resolver]), PostProcessChain::new())
        .download_all(&inputs(&["m:a"]))
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(harness.path("a.flv")).unwrap(), "a");
}

#[tokio::test]
async fn test_escaped_placeholder_template_with_two_inputs_is_ambiguous() {
    let harness = Harness::new();
    let resolver = Arc::new(ScriptedResolver::new("scripted", "m:"));
    let config = Config {
        output_template: OutputTemplate::new(format!(
            "{}/clip%%(id)s.flv",
            harness.dir.path().display()
        )),
        ..Config::default()
    };

    let err = harness
        .downloader(config, registry_of(vec![resolver]), PostProcessChain::new())
        .download_all(&inputs(&["m:a", "m:b"]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AmbiguousDestination);
    assert!(harness.opener.opened.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_post_processing_failure_is_absorbed_with_ignore_errors() {
    let harness = Harness::new();
    let resolver = Arc::new(ScriptedResolver::new("scripted", "m:"));
    let config = Config {
        ignore_errors: true,
        ..harness.config()
    };

    let outcome = harness
        .downloader(config, registry_of(vec![resolver]), rejecting_chain("a"))
        .download_all(&inputs(&["m:a", "m:b"]))
        .await
        .unwrap();

    assert_eq!(outcome.failed(), 1);
    assert_eq!(outcome.succeeded(), 1);
    assert_eq!(outcome.status(), 1);
    assert!(harness.path("b.flv").exists());
    assert_eq!(
        *harness.opener.opened.lock().unwrap(),
        vec!["mem://a", "mem://b"]
    );
    let errors = harness.notifier.messages(NoticeLevel::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("conversion failed"), "got {}", errors[0]);
}

#[tokio::test]
async fn test_post_processing_failure_stops_batch_without_ignore_errors() {
    let harness = Harness::new();
    let resolver = Arc::new(ScriptedResolver::new("scripted", "m:"));

    let err = harness
        .downloader(harness.config(), registry_of(vec![resolver]), rejecting_chain("a"))
        .download_all(&inputs(&["m:a", "m:b"]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PostProcessingFailure);
    assert_eq!(*harness.opener.opened.lock().unwrap(), vec!["mem://a"]);
    assert!(harness.path("a.flv").exists());
    assert!(!harness.path("b.flv").exists());
}
