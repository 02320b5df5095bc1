//! Context module.

use std::collections::HashMap;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::RwLock;

use crate::events::{Event, EventEmitter, Events};
use crate::sql::Sql;

/// An account.
///
/// Cheap to clone; all clones refer to the same account state.
#[derive(Debug, Clone)]
pub struct Context {
    pub(crate) inner: Arc<InnerContext>,
}

impl Deref for Context {
    type Target = InnerContext;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// The actual account state behind [Context].
#[derive(Debug)]
pub struct InnerContext {
    /// Database file path.
    pub(crate) dbfile: PathBuf,
    /// SQLite database.
    pub(crate) sql: Sql,
    pub(crate) events: Events,
    pub(crate) translated_stockstrings: RwLock<HashMap<usize, String>>,
    /// Set while a secret key is being generated.
    ///
    /// A second caller fails fast instead of queueing behind a
    /// multi-second key generation.
    pub(crate) generating_keypair: AtomicBool,
}

impl Context {
    /// Creates a new context and opens the database at `dbfile`.
    pub async fn new(dbfile: PathBuf) -> Result<Context> {
        let inner = InnerContext {
            dbfile,
            sql: Sql::new(),
            events: Events::new(),
            translated_stockstrings: RwLock::new(HashMap::new()),
            generating_keypair: AtomicBool::new(false),
        };

        let ctx = Context {
            inner: Arc::new(inner),
        };

        ctx.sql.open(&ctx.dbfile).await?;

        Ok(ctx)
    }

    /// Returns the database file path.
    pub fn get_dbfile(&self) -> &Path {
        self.dbfile.as_path()
    }

    /// Emits a single event.
    pub fn emit_event(&self, event: Event) {
        self.events.emit(event);
    }

    /// Returns a receiver for the context's event queue.
    pub fn get_event_emitter(&self) -> EventEmitter {
        self.events.get_emitter()
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::TestContext;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_new_opens_db() {
        let t = TestContext::new().await;
        assert!(t.ctx.sql.is_open().await);
        assert!(t.ctx.get_dbfile().exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_event_emitter() {
        let t = TestContext::new().await;
        let emitter = t.ctx.get_event_emitter();
        t.ctx
            .emit_event(crate::events::Event::Info("hello".to_string()));
        assert_eq!(
            emitter.recv().await,
            Some(crate::events::Event::Info("hello".to_string()))
        );
    }
}
