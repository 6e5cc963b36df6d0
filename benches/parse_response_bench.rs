use criterion::{Criterion, criterion_group, criterion_main};
use quizgen::generation::parser::parse_questions;
use quizgen::generation::prompt::render_block;
use std::hint::black_box;

fn grammar_response(count: usize) -> String {
    (0..count)
        .map(|i| {
            render_block(
                &format!("ما ناتج جمع {i} و {i}؟"),
                &["واحد", "اثنان", "ثلاثة", "أربعة"],
                i % 4,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn loose_response(count: usize) -> String {
    (0..count)
        .map(|i| format!("{}. ما ناتج ضرب {i} في 2؟\nA) {}\nB) 1\nC) 0\nD) 3\n", i + 1, i * 2))
        .collect::<Vec<_>>()
        .join("\n")
}

fn bench_parse_questions(c: &mut Criterion) {
    let grammar = grammar_response(20);
    let loose = loose_response(20);

    c.bench_function("parse_questions_primary", |b| {
        b.iter(|| black_box(parse_questions(black_box(&grammar), 20)))
    });
    c.bench_function("parse_questions_fallback", |b| {
        b.iter(|| black_box(parse_questions(black_box(&loose), 20)))
    });
}

criterion_group!(benches, bench_parse_questions);
criterion_main!(benches);
