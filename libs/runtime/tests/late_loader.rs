//! Late-binding loader tests against a seeded catalog

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use metrum_dsl::{compile, extend, CompileOptions, Diagnostic, Diagnostics, RedeclarationPolicy, Stage};
use metrum_runtime::{
    decompile, BuildRequest, CancellationToken, Catalog, DescriptorBuilder, FileSystemStore,
    LateLoader, LoadError, LoadedModule, LoaderConfig, ModuleArtifact, ModuleBuilder, ModuleStore,
};

const SI: &str = r#"
    unit Meter "m" = <Length>;
    unit Centimeter "cm" = Meter / 100;
    unit Second "s" = <Time>;
    unit Kelvin "K" = <Temperature>;
    scale TempK AbsoluteZero = 0 from Kelvin;
"#;

fn seeded() -> Catalog {
    let compilation = compile(SI, &CompileOptions::default()).unwrap();
    assert!(compilation.is_success(), "{}", compilation.diagnostics);

    let catalog = Catalog::new();
    catalog
        .register(LoadedModule::from_model("si", &compilation.model))
        .unwrap();
    catalog
}

fn loader(catalog: &Catalog) -> LateLoader<'_> {
    LateLoader::new(catalog, DescriptorBuilder, LoaderConfig::default())
}

fn loader_with(catalog: &Catalog, redeclaration: RedeclarationPolicy) -> LateLoader<'_> {
    let config = LoaderConfig {
        redeclaration,
        ..LoaderConfig::default()
    };
    LateLoader::new(catalog, DescriptorBuilder, config)
}

fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("metrum-late-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn messages(error: &LoadError) -> Vec<String> {
    error.diagnostics().iter().map(|d| d.message.clone()).collect()
}

/// Builder recording the requests it was handed
#[derive(Default, Clone)]
struct RecordingBuilder {
    requests: Arc<Mutex<Vec<BuildRequest>>>,
}

impl ModuleBuilder for RecordingBuilder {
    fn build(&self, request: &BuildRequest) -> Result<ModuleArtifact, Diagnostics> {
        self.requests.lock().unwrap().push(request.clone());
        DescriptorBuilder.build(request)
    }

    fn load(&self, artifact: &ModuleArtifact) -> Result<LoadedModule, Diagnostics> {
        DescriptorBuilder.load(artifact)
    }
}

struct FailingBuilder;

impl ModuleBuilder for FailingBuilder {
    fn build(&self, request: &BuildRequest) -> Result<ModuleArtifact, Diagnostics> {
        let mut diagnostics = Diagnostics::for_source(request.module.clone());
        diagnostics.push(Diagnostic::error(Stage::Backend, "linker exploded"));
        Err(diagnostics)
    }

    fn load(&self, _artifact: &ModuleArtifact) -> Result<LoadedModule, Diagnostics> {
        unreachable!("nothing was built")
    }
}

#[test]
fn test_late_unit_joins_compiled_family() {
    let catalog = seeded();
    let report = loader(&catalog)
        .load_str(r#"unit Foot "ft" = 0.3048 * Meter;"#, &CancellationToken::new())
        .unwrap();

    assert_eq!(report.module, "late_1");
    assert_eq!(report.units, vec!["Foot".to_string()]);
    assert!(!report.from_cache);

    let foot = catalog.unit_by_tag("ft").unwrap();
    let meter = catalog.unit("Meter").unwrap();
    assert_eq!(foot.descriptor().module, "late_1");
    assert_eq!(foot.descriptor().family, meter.descriptor().family);
    assert_eq!(catalog.family_units(meter.descriptor().family).len(), 3);
    assert_eq!(catalog.modules(), vec!["si".to_string(), "late_1".to_string()]);
}

#[test]
fn test_redeclared_unit_gets_new_family() {
    let catalog = seeded();
    let max_before = catalog.max_family().unwrap();

    let report = loader(&catalog)
        .load_str(r#"unit Meter "m" = <Length>;"#, &CancellationToken::new())
        .unwrap();
    assert_eq!(report.units, vec!["Meter".to_string()]);

    let meters: Vec<_> = catalog
        .units()
        .into_iter()
        .filter(|u| u.descriptor().name == "Meter")
        .collect();
    assert_eq!(meters.len(), 2);
    let (compiled, late) = (meters[0].descriptor(), meters[1].descriptor());
    assert_eq!(compiled.module, "si");
    assert_eq!(late.module, report.module);
    assert_eq!(late.dimension, compiled.dimension);
    assert_eq!(late.factor, compiled.factor);
    assert_ne!(late.family, compiled.family);
    assert!(late.family > max_before);

    // lookups see the newest declaration
    assert_eq!(catalog.unit("Meter").unwrap().descriptor().module, report.module);
}

#[test]
fn test_alias_binds_to_compiled_unit() {
    let catalog = seeded();
    let report = loader_with(&catalog, RedeclarationPolicy::Alias)
        .load_str(
            r#"unit Meter "m" = <Length>; unit Inch "in" = 0.0254 * Meter;"#,
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(report.units, vec!["Inch".to_string()]);
    let meters = catalog
        .units()
        .into_iter()
        .filter(|u| u.descriptor().name == "Meter")
        .count();
    assert_eq!(meters, 1);
    assert_eq!(
        catalog.unit("Inch").unwrap().descriptor().family,
        catalog.unit("Meter").unwrap().descriptor().family
    );
}

#[test]
fn test_alias_with_different_definition_fails() {
    let catalog = seeded();
    let err = loader_with(&catalog, RedeclarationPolicy::Alias)
        .load_str(r#"unit Meter "m" = 2 * <Length>;"#, &CancellationToken::new())
        .unwrap_err();

    assert!(matches!(err, LoadError::Definitions(_)));
    assert_eq!(
        messages(&err),
        vec!["Unit 'Meter' redeclares the unit from module 'si' with a different definition".to_string()]
    );
    assert_eq!(catalog.modules(), vec!["si".to_string()]);
}

#[test]
fn test_reject_policy() {
    let catalog = seeded();
    let err = loader_with(&catalog, RedeclarationPolicy::Reject)
        .load_str(r#"unit Meter "m" = <Length>;"#, &CancellationToken::new())
        .unwrap_err();

    assert_eq!(
        messages(&err),
        vec!["Unit 'Meter' is already defined in module 'si'".to_string()]
    );
}

#[test]
fn test_failed_definitions_leave_catalog_unchanged() {
    let catalog = seeded();
    let units_before = catalog.units().len();

    let err = loader(&catalog)
        .load_str(
            r#"unit Foot "ft" = 0.3048 * Meter; unit Bad "b" = Furlong;"#,
            &CancellationToken::new(),
        )
        .unwrap_err();

    assert!(matches!(err, LoadError::Definitions(ref d) if d.error_count() == 1));
    assert_eq!(catalog.units().len(), units_before);
    assert!(catalog.unit("Foot").is_none());
    assert_eq!(catalog.modules(), vec!["si".to_string()]);
}

#[test]
fn test_builder_failure_is_atomic() {
    let catalog = seeded();
    let dir = temp_dir();
    let definitions = dir.join("imperial.units");
    fs::write(&definitions, r#"unit Foot "ft" = 0.3048 * Meter;"#).unwrap();
    let store = FileSystemStore::new(dir.join("store"));

    let err = LateLoader::new(&catalog, FailingBuilder, LoaderConfig::default())
        .with_store(store.clone())
        .load_file(&definitions, &CancellationToken::new())
        .unwrap_err();

    match &err {
        LoadError::Build { module, diagnostics } => {
            assert_eq!(module, "late_imperial");
            assert_eq!(diagnostics.error_count(), 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(messages(&err), vec!["linker exploded".to_string()]);
    assert!(catalog.unit("Foot").is_none());
    assert!(!store.manifest_path("late_imperial").exists());

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn test_cancelled_load_commits_nothing() {
    let catalog = seeded();
    let dir = temp_dir();
    let definitions = dir.join("imperial.units");
    fs::write(&definitions, r#"unit Foot "ft" = 0.3048 * Meter;"#).unwrap();
    let store = FileSystemStore::new(dir.join("store"));

    let cancel = CancellationToken::new();
    let observer = cancel.clone();
    cancel.cancel();
    assert!(observer.is_cancelled());

    let err = loader(&catalog)
        .with_store(store.clone())
        .load_file(&definitions, &observer)
        .unwrap_err();

    assert!(matches!(err, LoadError::Cancelled));
    assert!(!store.source_path("late_imperial").exists());
    assert!(!store.manifest_path("late_imperial").exists());
    assert_eq!(catalog.modules(), vec!["si".to_string()]);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn test_stored_module_is_reused() {
    let dir = temp_dir();
    let definitions = dir.join("Imperial Units.units");
    fs::write(
        &definitions,
        r#"unit Foot "ft" = 0.3048 * Meter; scale TempR AbsoluteZero = 0 from Kelvin;"#,
    )
    .unwrap();
    let store = FileSystemStore::new(dir.join("store"));

    let first = seeded();
    let built = loader(&first)
        .with_store(store.clone())
        .load_file(&definitions, &CancellationToken::new())
        .unwrap();
    assert_eq!(built.module, "late_imperial_units");
    assert!(!built.from_cache);
    assert!(store.is_fresh(&definitions, &built.module).unwrap());
    assert!(fs::read_to_string(store.source_path(&built.module))
        .unwrap()
        .starts_with("pub mod late_imperial_units {"));

    // a new process with the same compiled definitions
    let second = seeded();
    let cached = loader(&second)
        .with_store(store)
        .load_file(&definitions, &CancellationToken::new())
        .unwrap();
    assert!(cached.from_cache);
    assert_eq!(cached.units, built.units);
    assert_eq!(cached.scales, vec!["TempR".to_string()]);

    let scale = second.scale("TempR").unwrap();
    assert_eq!(scale.descriptor().unit_module, "si");
    assert_eq!(
        second.unit("Foot").unwrap().descriptor(),
        first.unit("Foot").unwrap().descriptor()
    );

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn test_stored_families_taken_in_this_process_are_rebuilt() {
    let dir = temp_dir();
    let definitions = dir.join("money.units");
    fs::write(&definitions, r#"unit Dollar "USD" = <Money>;"#).unwrap();
    let store = FileSystemStore::new(dir.join("store"));

    let first = seeded();
    loader(&first)
        .with_store(store.clone())
        .load_file(&definitions, &CancellationToken::new())
        .unwrap();
    let stored = first.unit("Dollar").unwrap().descriptor().family;

    // another late module claims the stored family id first
    let second = seeded();
    let loader = loader(&second).with_store(store.clone());
    loader
        .load_str(r#"unit Candela "cd" = <LuminousIntensity>;"#, &CancellationToken::new())
        .unwrap();
    let candela = second.unit("Candela").unwrap().descriptor().family;
    assert_eq!(candela, stored);

    let report = loader
        .load_file(&definitions, &CancellationToken::new())
        .unwrap();
    assert!(!report.from_cache);

    let dollar = second.unit("Dollar").unwrap().descriptor().family;
    assert_ne!(dollar, candela);
    let names = |family| -> Vec<String> {
        second
            .family_units(family)
            .iter()
            .map(|u| u.descriptor().name.clone())
            .collect()
    };
    assert_eq!(names(candela), vec!["Candela".to_string()]);
    assert_eq!(names(dollar), vec!["Dollar".to_string()]);

    // the rebuilt module replaced the stale one
    let artifact = store.read("late_money").unwrap();
    assert_eq!(artifact.units[0].family, dollar);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn test_stored_module_with_unloaded_reference_is_rebuilt() {
    let dir = temp_dir();
    let money = dir.join("money.units");
    fs::write(&money, r#"unit Dollar "USD" = <Money>;"#).unwrap();
    let prices = dir.join("prices.units");
    fs::write(&prices, r#"scale Price = 0 from Dollar;"#).unwrap();
    let store = FileSystemStore::new(dir.join("store"));

    let first = seeded();
    let loader_first = loader(&first).with_store(store.clone());
    loader_first
        .load_file(&money, &CancellationToken::new())
        .unwrap();
    loader_first
        .load_file(&prices, &CancellationToken::new())
        .unwrap();
    assert!(store
        .read("late_prices")
        .unwrap()
        .references
        .contains(&"late_money".to_string()));

    // late_money is never loaded here, so the stored scale cannot be used
    let second = seeded();
    let err = loader(&second)
        .with_store(store)
        .load_file(&prices, &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, LoadError::Definitions(_)), "{:?}", err);
    assert!(messages(&err).iter().any(|m| m.contains("Dollar")), "{:?}", messages(&err));
    assert!(second.scale("Price").is_none());
    assert_eq!(second.modules(), vec!["si".to_string()]);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn test_same_file_twice_is_a_duplicate() {
    let catalog = seeded();
    let dir = temp_dir();
    let definitions = dir.join("imperial.units");
    fs::write(&definitions, r#"unit Foot "ft" = 0.3048 * Meter;"#).unwrap();

    let loader = loader(&catalog);
    loader
        .load_file(&definitions, &CancellationToken::new())
        .unwrap();
    let err = loader
        .load_file(&definitions, &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, LoadError::DuplicateModule(name) if name == "late_imperial"));

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn test_missing_file_is_io_error() {
    let catalog = seeded();
    let err = loader(&catalog)
        .load_file(&temp_dir().join("absent.units"), &CancellationToken::new())
        .unwrap_err();

    assert!(matches!(err, LoadError::Io { .. }));
    let diagnostics = err.diagnostics();
    let diagnostic = diagnostics.iter().next().unwrap();
    assert_eq!(diagnostic.stage, Stage::Backend);
    assert!(diagnostic.source.as_deref().unwrap().ends_with("absent.units"));
}

#[test]
fn test_empty_definitions() {
    let catalog = seeded();
    let err = loader(&catalog)
        .load_str("// nothing new\n", &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, LoadError::Empty));
}

#[test]
fn test_generated_source_covers_late_operations() {
    let catalog = seeded();
    let builder = RecordingBuilder::default();
    let config = LoaderConfig {
        references: vec!["host".to_string()],
        ..LoaderConfig::default()
    };
    LateLoader::new(&catalog, builder.clone(), config)
        .load_str(
            r#"unit Meter_Sec "m/s" = Meter / Second;"#,
            &CancellationToken::new(),
        )
        .unwrap();

    let requests = builder.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.module, "late_1");
    assert_eq!(request.references, vec!["host".to_string(), "si".to_string()]);
    assert_eq!(request.units.len(), 1);
    assert!(request.source.starts_with("pub mod late_1 {"));
    assert!(request.source.contains("pub struct Meter_Sec"));
    assert!(request.source.contains("pub fn meter_div_second"));
    // compiled units are only referenced, never emitted again
    assert!(!request.source.contains("pub struct Meter("));
}

#[test]
fn test_decompile_then_resolve_keeps_units() {
    let compilation = compile(SI, &CompileOptions::default()).unwrap();
    let module = LoadedModule::from_model("si", &compilation.model);

    let decompiled = decompile(&module.units, &module.scales).unwrap();
    let resolved = extend(decompiled.model, "", &CompileOptions::default()).unwrap();
    assert!(resolved.is_success());

    for (original, again) in compilation.model.units.iter().zip(&resolved.model.units) {
        assert_eq!(original.name, again.name);
        assert_eq!(original.dimension.value, again.dimension.value);
        assert!(original.factor.value.approx_eq(&again.factor.value, 1e-12));
        assert_eq!(original.family, again.family);
        assert_eq!(original.prime, again.prime);
    }
    assert_eq!(resolved.model.operations.len(), compilation.model.operations.len());
}
