use anyhow::{Context, Result, anyhow};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tracing::debug;

use crate::error::ProviderError;
use crate::prompts::LanguagePair;

pub trait OfflineEngine: Send + Sync {
    fn model_name(&self) -> String;
    fn translate_line(&self, line: &str) -> Result<String, ProviderError>;
}

pub trait EngineFactory: Send + Sync {
    fn create(&self, pair: &LanguagePair) -> Result<Arc<dyn OfflineEngine>, ProviderError>;
}

// Blank lines are kept in place so paragraph structure survives translation.
pub fn translate_lines(engine: &dyn OfflineEngine, text: &str) -> Result<String, ProviderError> {
    let mut out = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            out.push(String::new());
            continue;
        }
        out.push(engine.translate_line(trimmed)?.trim().to_string());
    }
    Ok(out.join("\n"))
}

#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    pair: LanguagePair,
}

impl CommandEngine {
    fn run(&self, line: &str) -> Result<String> {
        let output = Command::new(&self.program)
            .arg("--from-lang")
            .arg(&self.pair.source)
            .arg("--to-lang")
            .arg(&self.pair.target)
            .arg(line)
            .output()
            .with_context(|| format!("failed to run {} (is it installed?)", self.program))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("{} failed: {}", self.program, stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl OfflineEngine for CommandEngine {
    fn model_name(&self) -> String {
        let program = Path::new(&self.program)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.clone());
        format!("{}:{}-{}", program, self.pair.source, self.pair.target)
    }

    fn translate_line(&self, line: &str) -> Result<String, ProviderError> {
        self.run(line)
            .map_err(|err| ProviderError::OfflineMt(format!("{err:#}")))
    }
}

#[derive(Debug, Clone)]
pub struct CommandEngineFactory {
    program: String,
}

impl CommandEngineFactory {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl EngineFactory for CommandEngineFactory {
    fn create(&self, pair: &LanguagePair) -> Result<Arc<dyn OfflineEngine>, ProviderError> {
        if pair.source.is_empty() || pair.target.is_empty() {
            return Err(ProviderError::OfflineMt(format!(
                "unsupported language pair {}",
                pair.key()
            )));
        }
        Ok(Arc::new(CommandEngine {
            program: self.program.clone(),
            pair: pair.clone(),
        }))
    }
}

struct CacheState {
    engines: HashMap<String, Arc<dyn OfflineEngine>>,
    order: VecDeque<String>,
}

pub struct EngineCache {
    factory: Arc<dyn EngineFactory>,
    capacity: usize,
    state: Mutex<CacheState>,
}

impl EngineCache {
    pub fn new(factory: Arc<dyn EngineFactory>, capacity: usize) -> Self {
        Self {
            factory,
            capacity: capacity.max(1),
            state: Mutex::new(CacheState {
                engines: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.engines.clear();
        state.order.clear();
    }

    // Holding the lock across creation keeps one engine per pair even when
    // two workers ask for it at once.
    pub fn get(&self, pair: &LanguagePair) -> Result<Arc<dyn OfflineEngine>, ProviderError> {
        let key = pair.key();
        let mut state = self.state.lock();
        if let Some(engine) = state.engines.get(&key) {
            return Ok(engine.clone());
        }
        debug!("loading offline translation engine for {}", key);
        let engine = self.factory.create(pair)?;
        while state.engines.len() >= self.capacity {
            let Some(oldest) = state.order.pop_front() else {
                break;
            };
            state.engines.remove(&oldest);
        }
        state.engines.insert(key.clone(), engine.clone());
        state.order.push_back(key);
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Upper;

    impl OfflineEngine for Upper {
        fn model_name(&self) -> String {
            "upper".to_string()
        }

        fn translate_line(&self, line: &str) -> Result<String, ProviderError> {
            Ok(line.to_uppercase())
        }
    }

    struct CountingFactory {
        created: AtomicUsize,
    }

    impl EngineFactory for CountingFactory {
        fn create(&self, _pair: &LanguagePair) -> Result<Arc<dyn OfflineEngine>, ProviderError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Upper))
        }
    }

    #[test]
    fn translates_line_by_line_keeping_blank_lines() {
        let text = translate_lines(&Upper, "hola\n\n  mundo  ").expect("translate");
        assert_eq!(text, "HOLA\n\nMUNDO");
    }

    #[test]
    fn engines_are_created_once_per_pair() {
        let factory = Arc::new(CountingFactory {
            created: AtomicUsize::new(0),
        });
        let cache = EngineCache::new(factory.clone(), 4);
        let pair = LanguagePair::new("es", "en");
        cache.get(&pair).expect("engine");
        cache.get(&pair).expect("engine");
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        cache.get(&LanguagePair::new("fr", "en")).expect("engine");
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn oldest_pair_is_evicted_at_capacity() {
        let factory = Arc::new(CountingFactory {
            created: AtomicUsize::new(0),
        });
        let cache = EngineCache::new(factory.clone(), 1);
        cache.get(&LanguagePair::new("es", "en")).expect("engine");
        cache.get(&LanguagePair::new("fr", "en")).expect("engine");
        assert_eq!(cache.len(), 1);
        cache.get(&LanguagePair::new("es", "en")).expect("engine");
        assert_eq!(factory.created.load(Ordering::SeqCst), 3);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn command_engine_reports_missing_program() {
        let factory = CommandEngineFactory::new("definitely-not-an-mt-binary");
        let engine = factory.create(&LanguagePair::new("es", "en")).expect("engine");
        assert_eq!(engine.model_name(), "definitely-not-an-mt-binary:es-en");
        let err = engine.translate_line("hola").expect_err("missing");
        assert!(matches!(err, ProviderError::OfflineMt(_)));
    }

    #[test]
    fn command_engine_is_named_after_the_program_it_runs() {
        let factory = CommandEngineFactory::new("/usr/local/bin/argos-translate");
        let engine = factory.create(&LanguagePair::new("fr", "de")).expect("engine");
        assert_eq!(engine.model_name(), "argos-translate:fr-de");
    }
}
