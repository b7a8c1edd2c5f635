use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use survey_workbench::{
    config::WorkbenchConfig,
    ingest::{self, Ingested},
    pipeline::{ChangeDescriptor, DuplicatesChange, duplicates},
    stats::{PValueMode, TestId},
    workbench::Workbench,
};

fn generate_responses(rows: usize) -> Ingested {
    let headers = ["respondent", "region", "group", "score", "comment"]
        .map(str::to_string)
        .to_vec();
    let records = (0..rows)
        .map(|i| {
            // Every tenth respondent is submitted twice.
            let id = if i % 10 == 9 { i - 1 } else { i };
            let region = ["north", "south", "east", "west"][id % 4];
            let group = if id % 2 == 0 { "control" } else { "treated" };
            let score = (id * 37 % 100) as f64 / 10.0 + if id % 2 == 0 { 0.0 } else { 1.5 };
            vec![
                id.to_string(),
                region.to_string(),
                group.to_string(),
                score.to_string(),
                format!("note {}", id % 50),
            ]
        })
        .collect::<Vec<_>>();
    ingest::ingest_records("bench.csv", &headers, &records, 1000).expect("ingest")
}

fn loaded_workbench(mode: PValueMode, ingested: Ingested) -> Workbench {
    let config = WorkbenchConfig {
        p_value_mode: mode,
        ..WorkbenchConfig::default()
    };
    let mut workbench = Workbench::new(config).expect("workbench");
    workbench
        .ingest(ingested.rows, ingested.variables, ingested.upload)
        .expect("load");
    workbench
}

fn bench_duplicates(c: &mut Criterion) {
    let ingested = generate_responses(20_000);
    let mut group = c.benchmark_group("duplicates");
    group.sample_size(20);

    group.bench_function("scan_exact", |b| {
        b.iter(|| duplicates::scan_exact_duplicates(&ingested.rows))
    });

    group.bench_function("remove_exact", |b| {
        b.iter_batched(
            || loaded_workbench(PValueMode::Approximate, generate_responses(20_000)),
            |mut workbench| {
                workbench
                    .apply_step(ChangeDescriptor::FixDuplicates(DuplicatesChange {
                        remove_exact: true,
                        ..DuplicatesChange::default()
                    }))
                    .expect("dedupe")
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

fn bench_tests(c: &mut Criterion) {
    let mut group = c.benchmark_group("tests");
    group.sample_size(30);

    for mode in [PValueMode::Approximate, PValueMode::Exact] {
        let workbench = loaded_workbench(mode, generate_responses(20_000));
        group.bench_function(format!("t_test_{mode:?}"), |b| {
            b.iter(|| {
                workbench
                    .run_test(TestId::IndependentTTest, "group", Some("score"))
                    .expect("t-test")
            })
        });
        group.bench_function(format!("chi_square_{mode:?}"), |b| {
            b.iter(|| {
                workbench
                    .run_test(TestId::ChiSquare, "region", Some("group"))
                    .expect("chi-square")
            })
        });
    }

    group.finish();
}

criterion_group!(analysis, bench_duplicates, bench_tests);
criterion_main!(analysis);
