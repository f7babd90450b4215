// Watchbot — competitor page monitoring pipeline.
//
// Watches a user-curated set of web pages, detects meaningful content
// changes between periodic fetches, enriches each change with a
// language-model analysis, and delivers per-subscriber digests. Multi-tenant
// with globally deduplicated fetching: a page tracked by many users is
// fetched once per round.
//
// Crate layout (leaves first):
//   store      — SQLite history: users/competitors/pages, snapshots,
//                changes, metadata
//   canonical  — HTML → deterministic text, the hashed/diffed form
//   diff       — line-set diff + unified rendering
//   fetch      — HTTP fetcher with retry behind the PageFetcher seam
//   llm        — provider-polymorphic chat client with retry + sanitization
//   pipeline   — RunCheck rounds, change analysis, heartbeat, scheduler
//   notify     — digest assembly + email/telegram/stdout channels
//   resolver   — free-form "monitor X" → validated URLs

pub mod canonical;
pub mod config;
pub mod diff;
pub mod error;
pub mod fetch;
pub mod llm;
pub mod notify;
pub mod pipeline;
pub mod resolver;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::{Result, WatchError};
pub use pipeline::{Pipeline, Scheduler};
pub use resolver::Resolver;
pub use store::Store;
