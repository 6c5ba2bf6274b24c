//! Builder and signer for the I2P router news feed.
//!
//! A build turns a data directory of HTML entries files, a `releases.json`
//! descriptor and an optional blocklist fragment into one Atom document per
//! (platform, channel, locale). Signing wraps each document in an SU3
//! container the router's update checker accepts.
//!
//! - **Feed** - parsing the inputs and assembling Atom ([`feed`])
//! - **Pipeline** - the platform matrix, input overrides and the build driver ([`pipeline`])
//! - **SU3** - envelope encoding, keys and the signing driver ([`su3`])
//! - **Settings** - `newsfeed.toml` ([`config`])
//!
//! # Data layout
//!
//! ```text
//! data/
//!     entries.html
//!     releases.json
//!     blocklist.xml
//!     translations/entries.<locale>.html
//!     <platform>/<channel>/...        per-platform overrides
//!
//! build/
//!     news.atom.xml  news.su3
//!     news_<locale>.atom.xml  news_<locale>.su3
//!     <platform>/<channel>/...
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use i2p_newsfeed::{run_build, sign_build_dir, BuildOptions, NewsSigningKey};
//!
//! let summary = run_build(&options)?;
//! let key = NewsSigningKey::from_file(Path::new("signing_key.pem"))?;
//! let report = sign_build_dir(&options.build_dir, &key, "news@mail.i2p");
//! ```

pub mod config;
pub mod error;
pub mod feed;
pub mod pipeline;
pub mod su3;

pub use error::{ErrorKind, FeedError, Result};
pub use feed::{build_feed, FeedConfig};
pub use pipeline::build::{run_build, BuildOptions, BuildSummary, FeedMetadata};
pub use pipeline::matrix::{expand_build_matrix, Target};
pub use su3::keys::{signature_type_for, KeyKind, NewsSigningKey, Su3Signer, Su3VerifyingKey};
pub use su3::sign::{sign_build_dir, sign_feed, SignReport};
pub use su3::{SignatureType, SignedSu3, Su3File};
