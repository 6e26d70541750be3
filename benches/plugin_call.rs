use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use script_picker::{Format, Options, Picker, PluginDescription, PluginError, PluginSet};

fn build_yaml(plugin_count: usize) -> String {
    let mut yaml = String::from("plugins:\n");
    for i in 0..plugin_count {
        yaml.push_str(&format!(
            "  - name: p{i}\n    define: \"let base = {i};\"\n    function: \"|x| x + base\"\n"
        ));
    }
    yaml
}

fn bench_load(c: &mut Criterion) {
    for size in [1usize, 10, 50] {
        c.bench_with_input(BenchmarkId::new("load_yaml_plugins", size), &size, |b, size| {
            let yaml = build_yaml(*size);
            b.iter(|| {
                let picker =
                    Picker::<fn(i64) -> i64>::parse_data(yaml.as_bytes(), &Format::Yaml, Options::new())
                        .unwrap();
                black_box(picker.len());
            });
        });
    }
}

fn native_inc(x: i64) -> i64 {
    x + 1
}

fn bench_call(c: &mut Criterion) {
    c.bench_function("call_native", |b| b.iter(|| black_box(native_inc(black_box(41)))));

    let set = PluginSet::new(vec![PluginDescription::new("inc", "|x| x + 1")]);

    let plain = Picker::<fn(i64) -> i64>::load(&set, Options::new()).unwrap();
    let inc = plain.get("inc").unwrap();
    c.bench_function("call_infallible", |b| b.iter(|| black_box(inc(black_box(41)))));

    let wrapped = Picker::<fn(i64) -> Result<i64, PluginError>>::load(&set, Options::new()).unwrap();
    let inc = wrapped.get("inc").unwrap();
    c.bench_function("call_safe_wrapped", |b| b.iter(|| black_box(inc(black_box(41)).unwrap())));

    let unwrapped = Picker::<fn(i64) -> Result<i64, PluginError>>::load(
        &set,
        Options::new().with_safe_func_wrap(false),
    )
    .unwrap();
    let inc = unwrapped.get("inc").unwrap();
    c.bench_function("call_unwrapped", |b| b.iter(|| black_box(inc(black_box(41)).unwrap())));
}

criterion_group!(benches, bench_load, bench_call);
criterion_main!(benches);
