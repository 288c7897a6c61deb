//! Metrum runtime
//!
//! The process-wide [`Catalog`] of materialized units and scales, and the
//! [`LateLoader`] that extends it with definitions compiled while the process
//! runs.
//!
//! Code generation and loading are host capabilities, behind two ports:
//! - [`ModuleBuilder`]: turns generated source into loadable handles
//!   ([`DescriptorBuilder`] for hosts without runtime code loading)
//! - [`ModuleStore`]: persists built modules between runs
//!   ([`FileSystemStore`])
//!
//! # Example
//!
//! ```rust
//! use metrum_dsl::{compile, CompileOptions};
//! use metrum_runtime::{
//!     CancellationToken, Catalog, DescriptorBuilder, LateLoader, LoadedModule, LoaderConfig,
//! };
//!
//! let catalog = Catalog::new();
//! let compiled = compile(r#"unit Meter "m" = <L>;"#, &CompileOptions::default()).unwrap();
//! catalog.register(LoadedModule::from_model("si", &compiled.model)).unwrap();
//!
//! let loader = LateLoader::new(&catalog, DescriptorBuilder, LoaderConfig::default());
//! let report = loader
//!     .load_str(r#"unit Foot "ft" = 0.3048 * Meter;"#, &CancellationToken::new())
//!     .unwrap();
//! assert_eq!(report.units, vec!["Foot".to_string()]);
//! assert!(catalog.unit("Foot").is_some());
//! ```

pub mod builder;
pub mod catalog;
pub mod decompile;
pub mod descriptor;
pub mod error;
pub mod loader;
pub mod store;

pub use builder::{BuildRequest, DescriptorBuilder, LoadedModule, ModuleArtifact, ModuleBuilder};
pub use catalog::Catalog;
pub use decompile::{decompile, Decompiled};
pub use descriptor::{ScaleDescriptor, ScaleHandle, ScaleRef, UnitDescriptor, UnitHandle, UnitRef};
pub use error::{LoadError, Result};
pub use loader::{CancellationToken, LateLoader, LoadReport, LoaderConfig};
pub use store::{FileSystemStore, ModuleStore};
