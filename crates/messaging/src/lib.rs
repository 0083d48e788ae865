//! Realtime messaging core.
//!
//! The [`SessionRegistry`] tracks live connections and the rooms they sit
//! in; the [`Gateway`] turns client events into store writes and room
//! broadcasts.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use database::Database;
//! use messaging::{Gateway, GatewayConfig, SessionRegistry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect("sqlite::memory:").await?;
//! db.migrate().await?;
//!
//! let gateway = Gateway::new(db, Arc::new(SessionRegistry::new()), GatewayConfig::default());
//! let mut session = gateway.connect(Some("555-0100")).await;
//!
//! gateway
//!     .handle_frame(session.id, r#"{"event":"join_chat","data":{"chatId":"..."}}"#)
//!     .await;
//!
//! while let Some(event) = session.events.recv().await {
//!     println!("{}", event.to_frame()?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod registry;

pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use events::{ClientEvent, ServerEvent};
pub use gateway::{Gateway, SendOrigin};
pub use registry::{Room, SessionHandle, SessionId, SessionRegistry};
