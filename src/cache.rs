// cache.rs - Compiled pattern cache.
//
// Two bounded tiers keyed by (pattern source, flags): a recency tier whose
// hits are moved to the back so the front entry is the eviction victim,
// and a smaller FIFO tier that is consulted first and never reordered.
// Both are filled on every miss. Compilation runs outside the lock, so two
// threads missing on the same key may both compile it; the last insert
// wins. Replacement templates have their own bounded cache, cleared
// together with the tiers by `purge`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, trace};

use crate::compiler::compile;
use crate::constants::Flags;
use crate::error::{Error, Result};
use crate::pattern::{Pattern, PatternInput, PatternSource};
use crate::subpattern::{FxIndexMap, ParsedPattern};
use crate::template::{compile_template, Template};

/// Turns pattern text into the tree the compiler consumes.
pub trait Parser: Send + Sync {
    fn parse(&self, source: &PatternSource, flags: Flags) -> Result<ParsedPattern>;
}

impl<F> Parser for F
where
    F: Fn(&PatternSource, Flags) -> Result<ParsedPattern> + Send + Sync,
{
    fn parse(&self, source: &PatternSource, flags: Flags) -> Result<ParsedPattern> {
        self(source, flags)
    }
}

// ============================================================================
// Configuration
// ============================================================================

pub const DEFAULT_MAX_CACHE: usize = 512;
pub const DEFAULT_MAX_FIFO: usize = 256;
pub const DEFAULT_MAX_TEMPLATES: usize = 512;

/// Tier capacities. A capacity of zero disables that tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    pub max_cache: usize,
    pub max_fifo: usize,
    pub max_templates: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            max_cache: DEFAULT_MAX_CACHE,
            max_fifo: DEFAULT_MAX_FIFO,
            max_templates: DEFAULT_MAX_TEMPLATES,
        }
    }
}

pub struct PatternCacheBuilder<P> {
    parser: P,
    config: CacheConfig,
}

impl<P: Parser> PatternCacheBuilder<P> {
    pub fn max_cache(mut self, n: usize) -> Self {
        self.config.max_cache = n;
        self
    }

    pub fn max_fifo(mut self, n: usize) -> Self {
        self.config.max_fifo = n;
        self
    }

    pub fn max_templates(mut self, n: usize) -> Self {
        self.config.max_templates = n;
        self
    }

    pub fn build(self) -> PatternCache<P> {
        PatternCache::with_config(self.parser, self.config)
    }
}

// ============================================================================
// Cache
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    source: PatternSource,
    flags: Flags,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct TemplateKey {
    pattern: CacheKey,
    repl: String,
}

#[derive(Default)]
struct Tiers {
    recent: FxIndexMap<CacheKey, Arc<Pattern>>,
    fifo: FxIndexMap<CacheKey, Arc<Pattern>>,
}

/// Insert at the back, dropping the front entry first when full.
fn insert_bounded<K, V>(map: &mut FxIndexMap<K, V>, key: K, value: V, max: usize, tier: &str)
where
    K: std::hash::Hash + Eq + std::fmt::Debug,
{
    if max == 0 {
        return;
    }
    if !map.contains_key(&key) && map.len() >= max {
        if let Some((evicted, _)) = map.shift_remove_index(0) {
            debug!("{} cache full, evicting {:?}", tier, evicted);
        }
    }
    map.insert(key, value);
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Process-wide cache of compiled patterns, parameterized by the parser
/// that turns sources into trees.
pub struct PatternCache<P> {
    parser: P,
    config: CacheConfig,
    tiers: Mutex<Tiers>,
    templates: Mutex<FxIndexMap<TemplateKey, Arc<Template>>>,
}

impl<P: Parser> PatternCache<P> {
    pub fn new(parser: P) -> Self {
        Self::with_config(parser, CacheConfig::default())
    }

    pub fn with_config(parser: P, config: CacheConfig) -> Self {
        PatternCache {
            parser,
            config,
            tiers: Mutex::new(Tiers::default()),
            templates: Mutex::new(FxIndexMap::default()),
        }
    }

    pub fn builder(parser: P) -> PatternCacheBuilder<P> {
        PatternCacheBuilder {
            parser,
            config: CacheConfig::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the compiled form of `pattern`, compiling it on a miss.
    ///
    /// An already-compiled pattern is returned unchanged; combining it
    /// with flags is an error. Patterns compiled with `DEBUG` are never
    /// cached.
    pub fn compile_cached(
        &self,
        pattern: impl Into<PatternInput>,
        flags: Flags,
    ) -> Result<Arc<Pattern>> {
        let source = match pattern.into() {
            PatternInput::Compiled(p) => {
                if !flags.is_empty() {
                    return Err(Error::InvalidArgument);
                }
                return Ok(p);
            }
            PatternInput::Source(source) => source,
        };
        let key = CacheKey { source, flags };

        {
            let mut tiers = lock(&self.tiers);
            if let Some(p) = tiers.fifo.get(&key) {
                trace!("pattern cache hit (fifo): {}", key.source);
                return Ok(Arc::clone(p));
            }
            if let Some(p) = tiers.recent.shift_remove(&key) {
                debug!("pattern cache hit: {}", key.source);
                self.store(&mut tiers, key, Arc::clone(&p));
                return Ok(p);
            }
        }

        debug!("pattern cache miss: {} flags={:?}", key.source, flags);
        let parsed = self.parser.parse(&key.source, flags)?;
        let compiled = Arc::new(compile(&parsed, flags, Some(key.source.clone()))?);
        if flags.contains(Flags::DEBUG) {
            return Ok(compiled);
        }

        let mut tiers = lock(&self.tiers);
        self.store(&mut tiers, key, Arc::clone(&compiled));
        Ok(compiled)
    }

    fn store(&self, tiers: &mut Tiers, key: CacheKey, p: Arc<Pattern>) {
        insert_bounded(
            &mut tiers.recent,
            key.clone(),
            Arc::clone(&p),
            self.config.max_cache,
            "recent",
        );
        insert_bounded(&mut tiers.fifo, key, p, self.config.max_fifo, "fifo");
    }

    /// Compile `repl` against `pattern`, memoized per (pattern, repl).
    /// Patterns without a recorded source are compiled without caching.
    pub fn compile_template(&self, pattern: &Pattern, repl: &str) -> Result<Arc<Template>> {
        let Some(source) = pattern.source() else {
            return compile_template(pattern, repl).map(Arc::new);
        };
        let key = TemplateKey {
            pattern: CacheKey {
                source: source.clone(),
                flags: pattern.flags(),
            },
            repl: repl.to_owned(),
        };
        if let Some(t) = lock(&self.templates).get(&key) {
            trace!("template cache hit: {:?}", key.repl);
            return Ok(Arc::clone(t));
        }
        let template = Arc::new(compile_template(pattern, repl)?);
        insert_bounded(
            &mut lock(&self.templates),
            key,
            Arc::clone(&template),
            self.config.max_templates,
            "template",
        );
        Ok(template)
    }

    /// Drop every cached pattern and template.
    pub fn purge(&self) {
        let mut tiers = lock(&self.tiers);
        tiers.recent.clear();
        tiers.fifo.clear();
        drop(tiers);
        lock(&self.templates).clear();
        debug!("pattern cache purged");
    }

    /// Entries in the recency tier.
    pub fn len(&self) -> usize {
        lock(&self.tiers).recent.len()
    }

    pub fn is_empty(&self) -> bool {
        let tiers = lock(&self.tiers);
        tiers.recent.is_empty() && tiers.fifo.is_empty()
    }

    /// Entries in the FIFO tier.
    pub fn fifo_len(&self) -> usize {
        lock(&self.tiers).fifo.len()
    }

    pub fn template_len(&self) -> usize {
        lock(&self.templates).len()
    }
}

// ============================================================================
// Tests
// ============================================================================
