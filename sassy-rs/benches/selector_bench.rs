use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sassy::ast::{Selector, TopLevel};
use sassy::json::JsonNode;
use sassy::parser::parse_patch;
use sassy::selectable::{Document, DocumentSet};
use sassy::selector::collect_targets;
use sassy::universe::{Logger, Universe};

/// `parts` documents with `modules` modules each, every module holding two
/// resources.
fn make_docs(parts: usize, modules: usize) -> DocumentSet {
    let mut docs = DocumentSet::new();
    for p in 0..parts {
        let mut root = JsonNode::new("part", format!("part_{p}")).with_ruleset("parts");
        for m in 0..modules {
            let name = format!("Module_{}", m % 7);
            root.add_class(&name);
            let mut module = JsonNode::new("module", name).with_ruleset("parts");
            module.push_child(JsonNode::new("resource", "fuel"));
            module.push_child(JsonNode::new("resource", "ox"));
            root.push_child(module);
        }
        docs.push(Document::new("parts_data", format!("part_{p}"), Box::new(root)));
    }
    docs
}

fn selector(src: &str) -> Selector {
    match parse_patch(&format!("{src} {{}}")).map(|p| p.statements.into_iter().next()) {
        Ok(Some(TopLevel::Selection(block))) => block.selector.clone(),
        other => panic!("bad selector {src}: {other:?}"),
    }
}

fn bench_collect(c: &mut Criterion) {
    let docs = make_docs(200, 12);
    let mut g = c.benchmark_group("collect_targets");
    for src in [
        "*",
        "module",
        "part.Module_3 > #Module_3",
        "module > resource#ox, part:parts",
        "module > +resource",
    ] {
        let sel = selector(src);
        g.bench_function(src, |b| {
            b.iter(|| collect_targets(black_box(&sel), black_box(&docs), None))
        });
    }
    g.finish();
}

const PATCH: &str = r#"
@define-stage "late": 10;
$scale: 1.5;
@function boosted($x, $k: $scale) { @return $x * $k; }
part.Module_3 > #Module_3 { thrust: boosted(60); tags +: ["boosted"]; }
module > resource#ox { amount: 10; }
@stage "late" part { checked: true; }
"#;

fn bench_register(c: &mut Criterion) {
    c.bench_function("register_patch_200_parts", |b| {
        b.iter_batched(
            || {
                let mut universe = Universe::new(Logger::new(|_| {}, |_| {}));
                let _ = universe.load_patch_source("bench", "bench.patch", PATCH);
                (universe, make_docs(200, 12))
            },
            |(mut universe, mut docs)| universe.register_all_patches(&mut docs),
            criterion::BatchSize::LargeInput,
        )
    });
}

fn bench_parse(c: &mut Criterion) {
    let src = PATCH.repeat(50);
    c.bench_function("parse_patch", |b| b.iter(|| parse_patch(black_box(&src))));
}

criterion_group!(benches, bench_collect, bench_register, bench_parse);
criterion_main!(benches);
