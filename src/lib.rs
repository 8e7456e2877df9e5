//! Layered application configuration: ordered sources merged into one flat,
//! shape-verified key-value space, bound into typed values through a small
//! tag language.
//!
//! ```ignore
//! let mut config = Configuration::new();
//! config.set_property("spring.active.profile", "online")?;
//! config.file().add(["app.toml", "app-${spring.active.profile}.yaml"]);
//!
//! let props = config.refresh()?;
//! let server: ServerConfig = props.bind_key("server")?;
//! ```
//!
//! # Design: a flat map, verified as a tree
//!
//! Configuration is naturally a tree, but file formats disagree about what a
//! tree is, and reading a tree node-by-node on every lookup costs CPU for no
//! benefit. So the engine stores everything as a flat `string → string` map
//! keyed by dotted paths (`server.hosts[0].name`) and keeps a parallel shape
//! tree whose only job is to reject writes that would change an established
//! shape: once `server` is a map, no later source may turn it into a value
//! or an array. Sources can be merged in any combination and the result is
//! still a coherent tree — or a precise error naming both sides of the
//! conflict.
//!
//! Empty containers survive flattening through two sentinel values: an empty
//! map stores `"{}"`, an empty array `"[]"`. The flat map alone is therefore
//! enough to reconstruct shape, which is what makes [`Properties`] cloning
//! and layer copying trivial.
//!
//! # Layer precedence
//!
//! ```text
//! Programmatic      set_property()
//!        ↑ overridden by
//! Files             file().add(...), in insertion order
//!        ↑ overridden by
//! Environment       GS_* / INCLUDE_ENV_PATTERNS / EXCLUDE_ENV_PATTERNS
//!        ↑ overridden by
//! Command line      -D key[=value]
//!        ↑ overridden by
//! Dynamic           dync().add(...)
//! ```
//!
//! Each [`Configuration::refresh`] replays the layers in this order into a
//! fresh [`ReadOnlyProperties`] snapshot. Later layers overwrite leaf values
//! key by key; shape conflicts fail the refresh. Snapshots are independent:
//! mutating the configuration afterwards never changes an old snapshot.
//!
//! # References
//!
//! Values and file locations may reference other properties with
//! `${key:=default}`. Defaults nest: `${a:=${b}}` falls back to the value of
//! `b` when `a` is missing. Expansion happens at read time — decoders never
//! expand anything, so a YAML file may safely contain `${…}` strings meant
//! for another system.
//!
//! # Binding
//!
//! [`Properties::bind_key`] and friends populate any [`FromProperties`]
//! type: primitive scalars, `String`, `Vec<E>`, string-keyed maps,
//! converter-backed types, and structs deriving `FromProperties`:
//!
//! ```ignore
//! #[derive(FromProperties)]
//! struct ServerConfig {
//!     #[value("${addr:=0.0.0.0}")]
//!     addr: String,
//!     #[value("${port:=8080}")]
//!     #[expr("$ > 0 && $ < 65536")]
//!     port: u16,
//!     pool_size: usize,        // untagged: bound from "pool.size"
//! }
//! ```
//!
//! A field tag names a key relative to where the struct is bound, an
//! optional default, and an optional named splitter for list fields
//! (`${points:=(1,2)|(3,4)}>>point`). An `#[expr("…")]` directive hands the
//! bound scalar to the process-wide validator, with `$` standing for the
//! value. Untagged fields synthesize their key from the field name
//! (lowercased, `_` → `.`); `#[value(flatten)]` embeds a nested struct at
//! the same key; `#[value(skip)]` leaves a field at its `Default`.
//!
//! # Extension points
//!
//! Four process-wide registries, populated with a default bundle and
//! extendable during program initialisation:
//!
//! - [`register_reader`] — file decoders by extension. Bundled: JSON, TOML,
//!   YAML, and Java-style properties.
//! - [`register_splitter`] — named string-to-list splitters for `>>name`
//!   tags.
//! - [`register_converter`] — string-to-value converters by target type.
//!   Bundled: `chrono::DateTime<FixedOffset>` and `std::time::Duration`.
//!   Pair with [`converter_target!`] to make the type bindable.
//! - [`set_validator`] — the single post-bind validator. Bundled: an
//!   expression validator over the `expr` directive.
//!
//! # Errors
//!
//! All fallible operations return [`ConfError`]. Binder and resolver
//! failures carry the raising site and the full path trail, so a deep
//! failure reads like
//! `src/bind.rs:210: bind ServerConfig.port error, property "server.port" not exist`.
//! The not-exist and invalid-syntax kinds are testable through wrappers via
//! [`ConfError::is_not_exist`] and [`ConfError::is_invalid_syntax`].

extern crate self as strata;

pub mod bind;
pub mod error;
pub mod registry;

mod args;
mod config;
mod env;
mod file;
mod flatten;
mod props;
mod readers;
mod resolve;
mod store;
mod tag;
mod validate;

pub use args::CommandArgs;
pub use bind::FromProperties;
pub use config::{Configuration, ReadOnlyProperties};
pub use env::{EXCLUDE_ENV_PATTERNS, Environment, INCLUDE_ENV_PATTERNS};
pub use error::ConfError;
pub use file::PropertySources;
pub use props::Properties;
pub use registry::{register_converter, register_reader, register_splitter, set_validator};
pub use tag::{BindParam, ParsedTag, parse_tag};
pub use validate::{ScalarValue, Validator};

#[cfg(feature = "derive")]
pub use strata_derive::FromProperties;
