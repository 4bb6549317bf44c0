//! End-to-end lineage scenarios over manifest/catalog fixtures

use colineage_core::{DiagnosticCode, InferenceConfig};
use colineage_dbt::{Catalog, ColumnCatalog, Manifest, ModelGraph};
use colineage_engine::{run_all_models, run_flat, run_targeted, ClosureResolver, Direction, Exporter};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn model(id: &str, sql: &str, deps: &[&str]) -> (String, Value) {
    (
        id.to_string(),
        json!({
            "unique_id": id,
            "resource_type": "model",
            "compiled_code": sql,
            "depends_on": {"nodes": deps}
        }),
    )
}

fn relation(id: &str, relation_type: &str, columns: &[&str]) -> (String, Value) {
    let columns: serde_json::Map<String, Value> = columns
        .iter()
        .enumerate()
        .map(|(i, name)| (name.to_string(), json!({"name": name, "index": i + 1, "type": "text"})))
        .collect();
    (id.to_string(), json!({"metadata": {"type": relation_type}, "columns": columns}))
}

fn load(models: Vec<(String, Value)>, relations: Vec<(String, Value)>) -> (ModelGraph, ColumnCatalog) {
    let nodes: serde_json::Map<String, Value> = models.into_iter().collect();
    let manifest = Manifest::from_str(&json!({"nodes": nodes}).to_string()).unwrap();

    let catalog_nodes: serde_json::Map<String, Value> = relations.into_iter().collect();
    let catalog = Catalog::from_str(&json!({"nodes": catalog_nodes}).to_string()).unwrap();

    (
        ModelGraph::from_manifest(&manifest),
        ColumnCatalog::from_catalog(&catalog, &InferenceConfig::default()),
    )
}

fn shop() -> (ModelGraph, ColumnCatalog) {
    load(
        vec![
            model(
                "model.shop.order_summary",
                "select id as order_id, amount as total from raw_orders",
                &["model.shop.raw_orders"],
            ),
            model(
                "model.shop.customer_orders",
                "select s.order_id as order_ref, c.name as customer_name\nfrom order_summary s\njoin customers c on s.order_id = c.order_id",
                &["model.shop.order_summary", "model.shop.customers"],
            ),
            model("model.shop.raw_orders", "select * from source_orders", &[]),
            model("model.shop.uncompiled", "", &["model.shop.raw_orders"]),
            model("model.shop.ephemeral", "select id as order_id from raw_orders", &["model.shop.raw_orders"]),
        ],
        vec![
            relation("model.shop.raw_orders", "table", &["id", "amount"]),
            relation("model.shop.order_summary", "view", &["order_id", "total"]),
            relation("model.shop.customers", "table", &["order_id", "name"]),
            relation("model.shop.customer_orders", "table", &["order_ref", "customer_name"]),
            relation("model.shop.uncompiled", "table", &["order_id"]),
        ],
    )
}

#[test]
fn unaliased_passthrough_records_no_edge() {
    let (graph, catalog) = load(
        vec![model(
            "model.shop.order_summary",
            "select order_id, sum(amount) as total from orders group by order_id",
            &["model.shop.orders"],
        )],
        vec![
            relation("model.shop.orders", "table", &["order_id", "customer_id"]),
            relation("model.shop.order_summary", "table", &["order_id", "total"]),
        ],
    );

    let flat = run_flat(&graph, &catalog, &InferenceConfig::default()).unwrap();

    assert!(flat.lineage.upstream_of("model.shop.order_summary", "order_id").is_none());
    // customer_id never appears in the SQL
    assert!(flat.lineage.edges().all(|e| e.upstream_column != "customer_id"));
    // `select order_id, sum(amount) as total` satisfies the aliasing pattern
    assert!(flat.lineage.contains("model.shop.order_summary", "total", "model.shop.orders", "order_id"));
}

#[test]
fn aliased_columns_record_edges() {
    let (graph, catalog) = shop();
    let flat = run_flat(&graph, &catalog, &InferenceConfig::default()).unwrap();
    let lineage = &flat.lineage;

    assert!(lineage.contains("model.shop.order_summary", "order_id", "model.shop.raw_orders", "id"));
    assert!(lineage.contains("model.shop.order_summary", "total", "model.shop.raw_orders", "amount"));
    assert!(!lineage.contains("model.shop.order_summary", "order_id", "model.shop.raw_orders", "amount"));
}

#[test]
fn join_predicate_and_alias_link_across_dependencies() {
    let (graph, catalog) = shop();
    let flat = run_flat(&graph, &catalog, &InferenceConfig::default()).unwrap();

    let upstreams = flat
        .lineage
        .upstream_of("model.shop.customer_orders", "order_ref")
        .unwrap();
    assert_eq!(upstreams.get("model.shop.order_summary"), Some(&vec!["order_id".to_string()]));
    assert_eq!(upstreams.get("model.shop.customers"), Some(&vec!["order_id".to_string()]));

    assert!(flat.lineage.contains(
        "model.shop.customer_orders",
        "customer_name",
        "model.shop.customers",
        "name"
    ));
}

#[test]
fn skipped_models_have_no_edges() {
    let (graph, catalog) = shop();
    let flat = run_flat(&graph, &catalog, &InferenceConfig::default()).unwrap();

    assert!(flat.lineage.model("model.shop.uncompiled").is_none());
    assert!(flat.lineage.model("model.shop.ephemeral").is_none());

    let codes: Vec<_> = flat.diagnostics.iter().map(|d| d.code).collect();
    assert!(codes.contains(&DiagnosticCode::ModelNoCompiledSql));
    assert!(codes.contains(&DiagnosticCode::ModelNotInCatalog));
}

#[test]
fn every_edge_is_anchored_to_the_catalog() {
    let (graph, catalog) = shop();
    let flat = run_flat(&graph, &catalog, &InferenceConfig::default()).unwrap();

    assert!(!flat.lineage.is_empty());
    for edge in flat.lineage.edges() {
        assert!(graph.parents(edge.model).iter().any(|dep| dep == edge.upstream_model));
        assert!(catalog.columns(edge.model).unwrap().iter().any(|c| c == edge.column));
        assert!(catalog
            .columns(edge.upstream_model)
            .unwrap()
            .iter()
            .any(|c| c == edge.upstream_column));

        let sql = &graph.get(edge.model).unwrap().compiled_sql;
        assert!(colineage_engine::inference::presence_regex(edge.upstream_column)
            .unwrap()
            .is_match(sql));
    }
}

#[test]
fn inference_is_idempotent() {
    let (graph, catalog) = shop();
    let first = run_flat(&graph, &catalog, &InferenceConfig::default()).unwrap();
    let second = run_flat(&graph, &catalog, &InferenceConfig::default()).unwrap();

    assert_eq!(first.lineage, second.lineage);
    assert_eq!(
        serde_json::to_string(&first.lineage).unwrap(),
        serde_json::to_string(&second.lineage).unwrap()
    );
}

#[test]
fn closures_agree_with_one_hop_edges() {
    let (graph, catalog) = shop();
    let flat = run_flat(&graph, &catalog, &InferenceConfig::default()).unwrap();
    let resolver = ClosureResolver::new(&flat.lineage);

    for edge in flat.lineage.edges() {
        let down = resolver.resolve(Direction::Downstream, edge.upstream_model, edge.upstream_column);
        assert!(down.reaches(edge.model, edge.column));

        let up = resolver.resolve(Direction::Upstream, edge.model, edge.column);
        assert!(up.reaches(edge.upstream_model, edge.upstream_column));
    }
}

#[test]
fn flat_downstream_csv_contains_inverted_row() {
    let (graph, catalog) = shop();
    let flat = run_flat(&graph, &catalog, &InferenceConfig::default()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    Exporter::new(dir.path())
        .export_flat(&flat.lineage, &flat.downstream)
        .unwrap();

    let csv = std::fs::read_to_string(dir.path().join("downstream_lineage.csv")).unwrap();
    assert!(csv.lines().any(|line| line == "raw_orders,id,order_summary,order_id"));
}

#[test]
fn targeted_run_expands_both_directions() {
    let (graph, catalog) = shop();
    let targeted = run_targeted(&graph, &catalog, &InferenceConfig::default(), Some("order_summary")).unwrap();

    assert_eq!(targeted.name, "order_summary");
    assert_eq!(targeted.target.as_deref(), Some("model.shop.order_summary"));

    let upstream = serde_json::to_value(&targeted.upstream).unwrap();
    assert_eq!(
        upstream["model.shop.order_summary"]["order_id"],
        json!({"model.shop.raw_orders": {"id": {}}})
    );

    let downstream = targeted
        .downstream
        .get("model.shop.order_summary", "order_id")
        .unwrap();
    assert!(downstream.reaches("model.shop.customer_orders", "order_ref"));
}

#[test]
fn missing_target_returns_empty_results() {
    let (graph, catalog) = shop();
    let targeted = run_targeted(&graph, &catalog, &InferenceConfig::default(), Some("nope")).unwrap();

    assert!(targeted.upstream.is_empty());
    assert!(targeted.downstream.is_empty());
    assert!(targeted.target.is_none());
    assert!(targeted
        .diagnostics
        .iter()
        .any(|d| d.code == DiagnosticCode::TargetModelNotFound));

    let report = targeted.report();
    assert!(report.has_warnings());
    assert_eq!(report.summary.warnings, 1);
}

#[test]
fn source_name_is_not_a_target() {
    let manifest = Manifest::from_str(
        &json!({
            "nodes": {},
            "sources": {
                "source.shop.raw.customers": {"unique_id": "source.shop.raw.customers", "name": "customers"}
            }
        })
        .to_string(),
    )
    .unwrap();
    let graph = ModelGraph::from_manifest(&manifest);

    let targeted = run_targeted(&graph, &ColumnCatalog::default(), &InferenceConfig::default(), Some("customers")).unwrap();
    let codes: Vec<_> = targeted.diagnostics.iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![DiagnosticCode::TargetModelNotFound]);
}

#[test]
fn cyclic_dependencies_terminate() {
    let (graph, catalog) = load(
        vec![
            model("model.p.a", "select y as x from b", &["model.p.b"]),
            model("model.p.b", "select x as y from a", &["model.p.a"]),
        ],
        vec![
            relation("model.p.a", "table", &["x"]),
            relation("model.p.b", "table", &["y"]),
        ],
    );

    let targeted = run_targeted(&graph, &catalog, &InferenceConfig::default(), Some("a")).unwrap();

    let upstream = serde_json::to_value(&targeted.upstream).unwrap();
    assert_eq!(
        upstream,
        json!({"model.p.a": {"x": {"model.p.b": {"y": {"model.p.a": {"x": {}}}}}}})
    );
    let downstream = serde_json::to_value(&targeted.downstream).unwrap();
    assert_eq!(
        downstream,
        json!({"model.p.a": {"x": {"model.p.b": {"y": {"model.p.a": {"x": {}}}}}}})
    );
}

#[test]
fn untargeted_run_expands_nothing() {
    let (graph, catalog) = shop();
    let targeted = run_targeted(&graph, &catalog, &InferenceConfig::default(), None).unwrap();

    assert_eq!(targeted.name, "all_models");
    assert!(targeted.target.is_none());
    assert!(targeted.upstream.is_empty());
    assert!(targeted.downstream.is_empty());
    // the one-hop graph is still inferred
    assert!(!targeted.lineage.is_empty());

    let dir = tempfile::tempdir().unwrap();
    Exporter::new(dir.path())
        .export_targeted(&targeted.name, &targeted.upstream, &targeted.downstream)
        .unwrap();

    let json = std::fs::read_to_string(dir.path().join("all_models_upstream_lineage.json")).unwrap();
    assert_eq!(json, "{}");
    let csv = std::fs::read_to_string(dir.path().join("all_models_downstream_lineage_depth.csv")).unwrap();
    assert_eq!(csv.lines().count(), 1);
}

#[test]
fn all_models_run_roots_every_cataloged_model() {
    let (graph, catalog) = shop();
    let targeted = run_all_models(&graph, &catalog, &InferenceConfig::default()).unwrap();

    assert_eq!(targeted.name, "all_models");
    assert!(targeted.upstream.get("model.shop.customer_orders", "order_ref").is_some());
    assert!(targeted.downstream.get("model.shop.raw_orders", "id").is_some());
    // not in the catalog
    assert!(targeted.upstream.get("model.shop.ephemeral", "order_id").is_none());
}

#[test]
fn all_models_run_skips_non_producing_relations() {
    let (graph, catalog) = load(
        vec![
            model("model.p.s", "select id as order_id from raw", &["seed.p.raw"]),
            (
                "seed.p.raw".to_string(),
                json!({"unique_id": "seed.p.raw", "resource_type": "seed"}),
            ),
        ],
        vec![
            relation("model.p.s", "table", &["order_id"]),
            relation("seed.p.raw", "table", &["id"]),
        ],
    );

    let targeted = run_all_models(&graph, &catalog, &InferenceConfig::default()).unwrap();
    assert!(targeted.upstream.get("model.p.s", "order_id").unwrap().reaches("seed.p.raw", "id"));
    assert!(targeted.upstream.get("seed.p.raw", "id").is_none());
}

#[test]
fn presence_gate_is_case_sensitive_in_inference() {
    let (graph, catalog) = load(
        vec![model(
            "model.shop.order_summary",
            "select ID as order_id from raw_orders",
            &["model.shop.raw_orders"],
        )],
        vec![
            relation("model.shop.raw_orders", "table", &["id"]),
            relation("model.shop.order_summary", "table", &["order_id"]),
        ],
    );

    let flat = run_flat(&graph, &catalog, &InferenceConfig::default()).unwrap();
    // the aliasing pattern alone would match `ID ... as order_id`
    assert!(colineage_engine::ColumnPatterns::new("order_id", "id")
        .unwrap()
        .is_match("select ID as order_id from raw_orders"));
    assert!(flat.lineage.is_empty());
}

#[test]
fn targeted_export_writes_six_artifacts() {
    let (graph, catalog) = shop();
    let targeted = run_targeted(&graph, &catalog, &InferenceConfig::default(), Some("customer_orders")).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let paths = Exporter::new(dir.path())
        .export_targeted(&targeted.name, &targeted.upstream, &targeted.downstream)
        .unwrap();
    assert_eq!(paths.len(), 6);

    let depth_csv =
        std::fs::read_to_string(dir.path().join("customer_orders_upstream_lineage_depth.csv")).unwrap();
    assert!(depth_csv.lines().any(|line| line == "customer_orders,order_ref,order_summary,order_id,1"));
    assert!(depth_csv.lines().any(|line| line == "order_summary,order_id,raw_orders,id,2"));

    let plain_csv = std::fs::read_to_string(dir.path().join("customer_orders_upstream_lineage.csv")).unwrap();
    assert!(plain_csv.lines().any(|line| line == "order_summary,order_id,raw_orders,id"));
}
