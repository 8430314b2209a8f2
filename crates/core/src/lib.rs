//! SecureLog core.
//!
//! Per-log-record pipeline that turns one message into a masked rendering
//! plus a SECURE_DATA envelope: the masking engine redacts sensitive leaves
//! while preserving the message's structural form, and the collected
//! originals are SM4-encrypted under a cached, SM2-wrapped key so auditors
//! holding the private key can recover them later.
//!
//! The entry point is [`RecordProcessor::process`]; logging-framework
//! adapters call it on the application thread and attach the returned
//! fields to the record. The pipeline is reentrant and never raises or
//! blocks on the hot path: a crypto fault degrades to "masked message, no
//! envelope".
//!
//! ```no_run
//! use securelog_core::{ConfigBuilder, Context, RecordProcessor};
//!
//! let config = ConfigBuilder::new()
//!     .load_default_file()?
//!     .set("ecc.public.key", "<base64 X.509 SM2 key>")
//!     .build()?;
//! let processor = RecordProcessor::new(config)?;
//!
//! let outcome = processor.process(
//!     r#"{"user":"alice","password":"p@ssw0rd"}"#,
//!     &Context::new(),
//! );
//! assert_eq!(outcome.masked, r#"{"user":"alice","password":"***"}"#);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod collector;
pub mod config;
pub mod context;
pub mod crypto;
pub mod envelope;
pub mod errors;
pub mod keycache;
pub mod masking;
pub mod rules;

mod processor;

pub use config::{ConfigBuilder, SecureLogConfig, Sm2Transformation, Sm4Mode};
pub use context::Context;
pub use errors::{ConfigError, CryptoError, EnvelopeError};
pub use processor::{ProcessOutcome, RecordProcessor};
