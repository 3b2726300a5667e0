use bdd_evidence::gherkin::{FeatureIndex, find_scenario};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn feature_text(scenarios: usize) -> String {
    let mut text = String::from("Funcionalidade: Solicitações\n\n  Contexto:\n    Dado que estou logado\n\n");
    for i in 0..scenarios {
        text.push_str(&format!(
            "  Cenário: CT{:03} - Solicitação nº {} com aprovação\n    Dado que abro a solicitação {}\n    Quando aprovo\n    Então vejo o status aprovado\n\n",
            i, i, i
        ));
    }
    text
}

fn benchmark_index(c: &mut Criterion) {
    let text = feature_text(500);

    c.bench_function("index_parse_500_scenarios", |b| {
        b.iter(|| {
            let mut index = FeatureIndex::new();
            index.parse_str(black_box(&text), None);
            index
        })
    });
}

fn benchmark_matcher(c: &mut Criterion) {
    let mut index = FeatureIndex::new();
    index.parse_str(&feature_text(500), None);

    c.bench_function("find_scenario_exact", |b| {
        b.iter(|| find_scenario(&index, black_box("CT250 - Solicitação nº 250 com aprovação")))
    });

    c.bench_function("find_scenario_normalized", |b| {
        b.iter(|| find_scenario(&index, black_box("CT499 - Solicitacao no 499 com aprovacao")))
    });

    c.bench_function("find_scenario_miss", |b| {
        b.iter(|| find_scenario(&index, black_box("CT999 - does not exist")))
    });
}

criterion_group!(benches, benchmark_index, benchmark_matcher);
criterion_main!(benches);
