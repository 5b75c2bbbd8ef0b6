//! Benchmark suite for Ralph subsystems.
//!
//! This module provides performance benchmarks for:
//! - Checklist parsing (PRD documents of growing size)
//! - Task description sanitization
//! - Agent request assembly
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Save baseline for comparison
//! cargo bench -- --save-baseline main
//!
//! # Compare against baseline
//! cargo bench -- --baseline main
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::path::Path;

use ralph_loop::config::TaskRequirements;
use ralph_loop::prompt::{
    apply_template, sanitize_task_description, PromptBuilder, TemplateVariables,
    DEFAULT_TASK_TEMPLATE,
};
use ralph_loop::task::{next_pending, TaskParser};

// ============================================================================
// Helpers
// ============================================================================

/// A PRD with `tasks` checklist items, every third one complete, padded with
/// prose the way real documents are.
fn generate_prd(tasks: usize) -> String {
    let mut prd = String::from("# Generated Project\n\n## Overview\n\nA project for benchmarking.\n\n## Tasks\n\n");
    for i in 0..tasks {
        let marker = if i % 3 == 0 { 'x' } else { ' ' };
        prd.push_str(&format!("- [{}] Implement feature number {}\n", marker, i));
        if i % 10 == 0 {
            prd.push_str("\n  Notes: keep the API stable.\n\n");
        }
    }
    prd
}

// ============================================================================
// Parsing Benchmarks
// ============================================================================

fn bench_parse_tasks(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_tasks");
    let parser = TaskParser::new().expect("task pattern compiles");

    for size in [10, 100, 1000] {
        let prd = generate_prd(size);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("parse", size), &prd, |b, prd| {
            b.iter(|| black_box(parser.parse(black_box(prd))));
        });
        group.bench_with_input(BenchmarkId::new("parse_and_select", size), &prd, |b, prd| {
            b.iter(|| {
                let tasks = parser.parse(black_box(prd));
                black_box(next_pending(&tasks).map(|t| t.line_number))
            });
        });
    }

    group.finish();
}

// ============================================================================
// Sanitization Benchmarks
// ============================================================================

fn bench_sanitize(c: &mut Criterion) {
    let mut group = c.benchmark_group("sanitize_task_description");

    let short = "Add a logout button to the navigation bar";
    let noisy = format!(
        "{}\u{0}\u{7}```rm -rf```\n\n\n\n{}",
        "Refactor the storage layer ".repeat(20),
        "and keep tests green ".repeat(20)
    );
    let oversized = "x".repeat(20_000);

    for (name, input) in [("short", short.to_string()), ("noisy", noisy), ("oversized", oversized)] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &input, |b, input| {
            b.iter(|| black_box(sanitize_task_description(black_box(input))));
        });
    }

    group.finish();
}

// ============================================================================
// Request Assembly Benchmarks
// ============================================================================

fn bench_request_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_assembly");

    let prd = generate_prd(200);
    let progress = "Iteration 1: set up project\n".repeat(50);
    let vars = TemplateVariables::new()
        .with_task("Implement feature number 7")
        .with_prd(prd.as_str())
        .with_progress(progress.as_str())
        .with_requirements("1. Implement the task")
        .with_workspace("/work/project");

    group.bench_function("apply_default_template", |b| {
        b.iter(|| black_box(apply_template(black_box(DEFAULT_TASK_TEMPLATE), &vars)));
    });

    let builder = PromptBuilder::new(
        Path::new("/work/project"),
        Path::new("/work/project/PRD.md"),
        Path::new("/work/project/progress.txt"),
    );
    let parser = TaskParser::new().expect("task pattern compiles");
    let tasks = parser.parse(&prd);
    let task = next_pending(&tasks).expect("generated PRD has pending tasks").clone();
    let requirements = TaskRequirements {
        write_tests: true,
        run_tests: true,
        commit_changes: true,
        ..Default::default()
    };

    group.bench_function("build_task_prompt", |b| {
        b.iter(|| {
            black_box(builder.build_task_prompt(
                black_box(&task),
                &prd,
                &progress,
                &requirements,
            ))
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_parse_tasks,
    bench_sanitize,
    bench_request_assembly
);
criterion_main!(benches);
