use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pubmed_search::integrations::pubmed::parse_efetch_xml;
use pubmed_search::{
    build_context, cosine_similarity, query, AdvancedClause, DocumentRecord, Operator, SourceMap,
};

fn compiler_benchmark(c: &mut Criterion) {
    let clauses: Vec<AdvancedClause> = (0..32)
        .map(|i| {
            let value = if i % 5 == 0 {
                "   ".to_string()
            } else {
                format!("term {i} with \"quotes\"")
            };
            AdvancedClause::new("Title/Abstract", value).with_operator(if i % 2 == 0 {
                Operator::And
            } else {
                Operator::Or
            })
        })
        .collect();

    c.bench_function("compile_advanced_query", |b| {
        b.iter(|| {
            let compiled = query::compile(black_box(&clauses)).unwrap_or_default();
            black_box(compiled.len());
        });
    });
}

fn cosine_benchmark(c: &mut Criterion) {
    // embedding-001 width
    let query: Vec<f32> = (0..768).map(|i| (i as f32).sin()).collect();
    let docs: Vec<Vec<f32>> = (0..200)
        .map(|d| (0..768).map(|i| ((i + d) as f32).cos()).collect())
        .collect();

    c.bench_function("cosine_rerank_200_docs", |b| {
        b.iter(|| {
            let scores: Vec<f32> = docs
                .iter()
                .filter_map(|doc| cosine_similarity(black_box(&query), doc).ok())
                .collect();
            black_box(scores.len());
        });
    });
}

fn source_map_benchmark(c: &mut Criterion) {
    let records: Vec<DocumentRecord> = (0..10)
        .map(|i| {
            DocumentRecord::new(
                i.to_string(),
                format!("Study {i}"),
                Some("Aspirin reduced headache frequency in adults. ".repeat(20)),
                "Jane Smith",
            )
        })
        .collect();
    let context = build_context(&records);

    c.bench_function("source_map_from_context", |b| {
        b.iter(|| {
            let map = SourceMap::from_context(black_box(&context));
            black_box(map.len());
        });
    });
}

fn efetch_benchmark(c: &mut Criterion) {
    let article = "<PubmedArticle><MedlineCitation><PMID>1</PMID><Article>\
        <ArticleTitle>Aspirin and headache</ArticleTitle>\
        <Abstract><AbstractText>Randomised trial of aspirin.</AbstractText></Abstract>\
        <AuthorList><Author><LastName>Smith</LastName><ForeName>Jane</ForeName></Author></AuthorList>\
        </Article></MedlineCitation></PubmedArticle>";
    let xml = format!("<PubmedArticleSet>{}</PubmedArticleSet>", article.repeat(200));

    c.bench_function("parse_efetch_200_articles", |b| {
        b.iter(|| {
            let records = parse_efetch_xml(black_box(&xml)).unwrap_or_default();
            black_box(records.len());
        });
    });
}

criterion_group!(
    pipeline,
    compiler_benchmark,
    cosine_benchmark,
    source_map_benchmark,
    efetch_benchmark
);
criterion_main!(pipeline);
