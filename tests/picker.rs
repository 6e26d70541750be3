use rhai::{CustomType, Dynamic, ImmutableString, TypeBuilder};
use script_picker::{
    Context, LoadState, Options, Picker, PickerError, PluginDescription, PluginError, PluginSet,
    PluginValue,
};
use std::io::Write;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread;
use tempfile::NamedTempFile;

fn temp_file(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[derive(Clone, Default)]
struct Widget {
    log: Arc<Mutex<String>>,
    v: Arc<Mutex<String>>,
}

impl Widget {
    fn record(&mut self, entry: ImmutableString) -> i64 {
        let mut log = self.log.lock().unwrap();
        log.push_str(&entry);
        log.len() as i64
    }

    fn get_v(&mut self) -> String {
        self.v.lock().unwrap().clone()
    }

    fn set_v(&mut self, value: String) {
        *self.v.lock().unwrap() = value.to_string();
    }
}

impl CustomType for Widget {
    fn build(mut builder: TypeBuilder<Self>) {
        builder
            .with_name("Widget")
            .with_fn("record", Widget::record)
            .with_get_set("V", Widget::get_v, Widget::set_v);
    }
}

impl PluginValue for Widget {}

#[derive(Clone)]
struct Bomb;

impl Bomb {
    fn explode(&mut self) -> i64 {
        panic!("boom")
    }
}

impl CustomType for Bomb {
    fn build(mut builder: TypeBuilder<Self>) {
        builder.with_name("Bomb").with_fn("explode", Bomb::explode);
    }
}

#[test]
fn test_parse_yaml_file() {
    let file = temp_file(
        ".yaml",
        r#"
plugins:
  - name: greet
    define: |
      let prefix = "hello, ";
    function: "|who| prefix + who"
  - name: shout
    define:
      - let suffix = "!";
    function: "|who| who.to_upper() + suffix"
"#,
    );
    let picker = Picker::<fn(String) -> String>::parse_file(file.path(), Options::new()).unwrap();
    assert_eq!(picker.list(), ["greet", "shout"]);
    assert_eq!(picker.get("greet").unwrap()("world".to_string()), "hello, world");
    assert_eq!(picker.get("shout").unwrap()("hey".to_string()), "HEY!");
}

#[test]
fn test_parse_json_and_toml_files() {
    let json = temp_file(
        ".json",
        r#"{"plugins": [{"name": "sum", "function": "|a, b| a + b"}]}"#,
    );
    let picker = Picker::<fn(i64, i64) -> i64>::parse_json_file(json.path(), Options::new()).unwrap();
    assert_eq!(picker.get("sum").unwrap()(2, 3), 5);

    let toml = temp_file(
        ".toml",
        r#"
[[plugins]]
name = "sum"
define = ["let bias = 10;"]
function = "|a, b| a + b + bias"
"#,
    );
    let picker = Picker::<fn(i64, i64) -> i64>::parse_file(toml.path(), Options::new()).unwrap();
    assert_eq!(picker.get("sum").unwrap()(2, 3), 15);
}

#[test]
fn test_unknown_extension_is_decode_error() {
    let file = temp_file(".ini", "plugins = nothing");
    let err = Picker::<fn() -> i64>::parse_file(file.path(), Options::new()).unwrap_err();
    assert!(matches!(err, PickerError::Decode { .. }));
}

#[test]
fn test_missing_file_is_io_error() {
    let err = Picker::<fn() -> i64>::parse_yaml_file("/definitely/not/here.yaml", Options::new())
        .unwrap_err();
    assert!(matches!(err, PickerError::Io { .. }));
}

#[test]
fn test_malformed_yaml_is_decode_error() {
    let file = temp_file(".yaml", "plugins: [name: {");
    let err = Picker::<fn() -> i64>::parse_file(file.path(), Options::new()).unwrap_err();
    match err {
        PickerError::Decode { format, .. } => assert_eq!(format, "yaml"),
        other => panic!("unexpected: {other}"),
    }
}

#[test]
fn test_duplicate_names_fail_registration() {
    let set = PluginSet::new(vec![
        PluginDescription::new("twin", "|| 1"),
        PluginDescription::new("twin", "|| 2"),
    ]);
    let err = Picker::<fn() -> i64>::load(&set, Options::new()).unwrap_err();
    match err {
        PickerError::Registration { name, source } => {
            assert_eq!(name, "twin");
            assert!(source.to_string().contains("plugin:twin exists"));
        }
        other => panic!("unexpected: {other}"),
    }
}

#[test]
fn test_custom_object_shared_with_host() {
    let widget = Widget::default();
    let log = Arc::clone(&widget.log);
    let set = PluginSet::new(vec![PluginDescription::new(
        "note",
        "|entry| { let w = cstpkg::widget; w.record(entry) }",
    )
    .with_import("cstpkg")]);
    let options = Options::new()
        .with_custom_type::<Widget>()
        .with_custom_object("cstpkg/widget", widget);

    let picker = Picker::<fn(String) -> i64>::load(&set, options).unwrap();
    let note = picker.get("note").unwrap();
    assert_eq!(note("ab".to_string()), 2);
    assert_eq!(note("cd".to_string()), 4);
    assert_eq!(*log.lock().unwrap(), "abcd");
}

#[test]
fn test_plugin_mutates_widget_argument() {
    let set = PluginSet::new(vec![PluginDescription::new(
        "stamp",
        r#"|w| { w.V = "hello world"; }"#,
    )]);
    let options = Options::new().with_custom_type::<Widget>();
    let picker = Picker::<fn(Widget)>::load(&set, options).unwrap();

    let widget = Widget::default();
    picker.get("stamp").unwrap()(widget.clone());
    assert_eq!(*widget.v.lock().unwrap(), "hello world");
}

#[test]
fn test_unqualified_object_lives_in_host() {
    let set = PluginSet::new(vec![PluginDescription::new("limit", "|x| if x > host::max { host::max } else { x }")]);
    let options = Options::new().with_custom_object("max", 100_i64);
    let picker = Picker::<fn(i64) -> i64>::load(&set, options).unwrap();
    let limit = picker.get("limit").unwrap();
    assert_eq!(limit(7), 7);
    assert_eq!(limit(700), 100);
}

#[test]
fn test_invalid_injection_path() {
    let options = Options::new().with_custom_object("a/b/c", 1_i64);
    let err = Picker::<fn() -> i64>::load(&PluginSet::default(), options).unwrap_err();
    assert!(matches!(err, PickerError::InjectedPathInvalid(_)));
}

#[test]
fn test_global_imports_reach_every_plugin() {
    let set = PluginSet::new(vec![
        PluginDescription::new("a", "|| shared::base + 1"),
        PluginDescription::new("b", "|| shared::base + 2"),
    ])
    .with_import("shared");
    let options = Options::new().with_custom_object("shared/base", 40_i64);
    let picker = Picker::<fn() -> i64>::load(&set, options).unwrap();
    assert_eq!(picker.get("a").unwrap()(), 41);
    assert_eq!(picker.get("b").unwrap()(), 42);
}

#[test]
fn test_unknown_import_fails_evaluation() {
    let set = PluginSet::new(vec![PluginDescription::new("p", "|| 1").with_import("nowhere")]);
    let err = Picker::<fn() -> i64>::load(&set, Options::new()).unwrap_err();
    assert!(matches!(err, PickerError::Evaluation { ref name, .. } if name == "p"));
}

#[test]
fn test_context_and_fmt_packages() {
    let set = PluginSet::new(vec![PluginDescription::new(
        "describe",
        r#"|ctx| fmt::sprintf("{} is {}", [ctx.get("user"), ctx.get("role")])"#,
    )]);
    let picker = Picker::<fn(Context) -> String>::load(&set, Options::new()).unwrap();
    let ctx = Context::background()
        .with_value("user", "ada")
        .with_value("role", "admin");
    assert_eq!(picker.get("describe").unwrap()(ctx), "ada is admin");
}

#[test]
fn test_context_built_in_script() {
    let set = PluginSet::new(vec![PluginDescription::new(
        "fresh",
        r#"|| context::background().with_value("k", 1).contains("k")"#,
    )]);
    let picker = Picker::<fn() -> bool>::load(&set, Options::new()).unwrap();
    assert!(picker.get("fresh").unwrap()());
}

#[test]
fn test_dynamic_arguments() {
    let set = PluginSet::new(vec![PluginDescription::new("kind", "|v| type_of(v)")]);
    let picker = Picker::<fn(Dynamic) -> String>::load(&set, Options::new()).unwrap();
    let kind = picker.get("kind").unwrap();
    assert_eq!(kind(Dynamic::from(1_i64)), "i64");
    assert_eq!(kind(Dynamic::from("s".to_string())), "string");
}

#[test]
fn test_panic_during_creation_is_reported() {
    let set = PluginSet::new(vec![
        PluginDescription::new("armed", "|| 1").with_define("let b = danger::bomb; let v = b.explode();"),
    ]);
    let options = Options::new()
        .with_custom_type::<Bomb>()
        .with_custom_object("danger/bomb", Bomb);
    let err = Picker::<fn() -> i64>::load(&set, options).unwrap_err();
    match err {
        PickerError::CreatePanicked { name, message, backtrace } => {
            assert_eq!(name, "armed");
            assert_eq!(message, "boom");
            assert!(!backtrace.is_empty());
        }
        other => panic!("unexpected: {other}"),
    }
}

#[test]
fn test_safe_wrap_recovers_host_panic() {
    let set = PluginSet::new(vec![PluginDescription::new(
        "risky",
        "|x| if x > 0 { x } else { let b = danger::bomb; b.explode() }",
    )]);
    let options = Options::new()
        .with_custom_type::<Bomb>()
        .with_custom_object("danger/bomb", Bomb);
    let picker = Picker::<fn(i64) -> Result<i64, PluginError>>::load(&set, options).unwrap();
    let risky = picker.get("risky").unwrap();
    assert_eq!(risky(3).unwrap(), 3);
    match risky(0) {
        Err(PluginError::Panicked { plugin, message, .. }) => {
            assert_eq!(plugin, "risky");
            assert_eq!(message, "boom");
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn test_safe_wrap_recovers_script_fault() {
    let set = PluginSet::new(vec![PluginDescription::new("div", "|x| 10 / x")]);
    let picker = Picker::<fn(i64) -> Result<i64, PluginError>>::load(&set, Options::new()).unwrap();
    let div = picker.get("div").unwrap();
    assert_eq!(div(5).unwrap(), 2);
    let err = div(0).unwrap_err();
    assert!(matches!(err, PluginError::Panicked { .. }));
    assert!(err.to_string().contains("Division by zero"));
}

#[test]
fn test_disabled_safe_wrap_propagates() {
    let set = PluginSet::new(vec![PluginDescription::new("div", "|x| 10 / x")]);
    let picker = Picker::<fn(i64) -> Result<i64, PluginError>>::load(
        &set,
        Options::new().with_safe_func_wrap(false),
    )
    .unwrap();
    let div = picker.get("div").unwrap();
    assert!(catch_unwind(AssertUnwindSafe(|| div(0))).is_err());
}

#[test]
fn test_infallible_shape_propagates_fault() {
    let set = PluginSet::new(vec![PluginDescription::new("div", "|x| 10 / x")]);
    let picker = Picker::<fn(i64) -> i64>::load(&set, Options::new()).unwrap();
    let div = picker.get("div").unwrap();
    assert!(catch_unwind(AssertUnwindSafe(|| div(0))).is_err());
}

#[test]
fn test_callables_are_shared_across_threads() {
    let set = PluginSet::new(vec![PluginDescription::new("square", "|x| x * x")]);
    let picker = Arc::new(Picker::<fn(i64) -> i64>::load(&set, Options::new()).unwrap());
    assert_eq!(picker.state(), LoadState::Ready);

    let handles: Vec<_> = (0..4_i64)
        .map(|i| {
            let picker = Arc::clone(&picker);
            thread::spawn(move || {
                let square = picker.get("square").unwrap();
                (0..100).map(|n| square(n + i)).sum::<i64>()
            })
        })
        .collect();
    let sums: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let expected: Vec<i64> = (0..4_i64)
        .map(|i| (0..100).map(|n: i64| (n + i) * (n + i)).sum())
        .collect();
    assert_eq!(sums, expected);
}

#[test]
fn test_reload_same_set_is_independent() {
    let set = PluginSet::new(vec![PluginDescription::new("one", "|| 1")]);
    let first = Picker::<fn() -> i64>::load(&set, Options::new()).unwrap();
    let second = Picker::<fn() -> i64>::load(&set, Options::new()).unwrap();
    assert_eq!(first.get("one").unwrap()(), second.get("one").unwrap()());
}
