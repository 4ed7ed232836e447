use crate::compute::map_reduce::{KeyValueEmitter, MapReduce, Stage};
use crate::compute::pagerank::{PageRankProgram, RankSumCombiner, OUT_DEGREE, PAGE_RANK};
use crate::compute::program::{
    ComputerFeatures, KeyType, ProgramConfig, ProgramFeatures, ProgramRegistry, VertexProgram,
};
use crate::compute::traversal_program::{TraversalOp, TraversalProgram, TRAVERSERS};
use crate::compute::view::ComputeVertex;
use crate::compute::{commit_messages, GraphComputer, Isolation, Messenger, SideEffects};
use crate::error::GfError;
use crate::graph::fixtures::classic_graph;
use crate::graph::property_value::PropertyValue;
use crate::graph::{Graph, GraphStore, VertexId};
use crate::process::traversal::Traversal;
use hashbrown::{HashMap, HashSet};
use itertools::Itertools;
use std::sync::Arc;

fn graph() -> Arc<dyn GraphStore + Send + Sync> {
    Arc::new(classic_graph())
}

fn rank_of(result: &crate::compute::ComputerResult, vertex: VertexId) -> f64 {
    result
        .compute_property(vertex, PAGE_RANK)
        .expect("View read failed")
        .expect("Expected a rank")
        .as_double()
        .expect("Expected a double")
}

#[test]
fn page_rank_converges_and_conserves_mass() {
    let result = GraphComputer::new(graph())
        .threads(4)
        .submit(Box::new(PageRankProgram::default()), Vec::new())
        .expect("Submit failed")
        .wait()
        .expect("Computation failed");
    assert!(result.supersteps() >= 2);
    assert!(result.supersteps() < 100, "Expected convergence, not the iteration cap");
    let ranks: Vec<f64> = (0..6).map(|vertex| rank_of(&result, vertex)).collect();
    for &rank in &ranks {
        assert!(rank > 0.0);
    }
    let total: f64 = ranks.iter().sum();
    assert!((total - 1.0).abs() < 1e-9, "Rank mass drifted to {}", total);
    // lop has three in-edges and must outrank the unreferenced marko.
    assert!(ranks[2] > ranks[0]);
    // The cached out-degree constants survive to the end.
    assert_eq!(
        result.compute_property(0, OUT_DEGREE).expect("View read failed"),
        Some(PropertyValue::Isize(3))
    );
}

#[test]
fn page_rank_map_reduce_extracts_all_ranks() {
    let result = GraphComputer::new(graph())
        .threads(3)
        .submit(Box::new(PageRankProgram::default()), Vec::new())
        .expect("Submit failed")
        .wait()
        .expect("Computation failed");
    let pairs = result.side_effects().get(PAGE_RANK).expect("Expected the rank side effect");
    let pairs = pairs.as_list().expect("Expected a list").to_vec();
    assert_eq!(pairs.len(), 6);
    let mut seen = Vec::new();
    for pair in pairs {
        if let PropertyValue::Pair(vertex, rank) = pair {
            let vertex = vertex.as_vertex().expect("Expected a vertex key");
            assert_eq!(rank_of(&result, vertex), rank.as_double().expect("Expected a double"));
            seen.push(vertex);
        } else {
            panic!("Expected (vertex, rank) pairs");
        }
    }
    seen.sort_unstable();
    assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
}

/// Writes the superstep number each superstep and checks the previous superstep's value is the
/// only one visible, which is exactly the BSP read contract.
struct IsolationProbe;

impl VertexProgram for IsolationProbe {
    fn name(&self) -> &'static str {
        "isolationProbe"
    }

    fn setup(&self, side_effects: &SideEffects) {
        side_effects.set("isolated", PropertyValue::Bool(true));
    }

    fn execute(
        &self,
        vertex: &ComputeVertex,
        _messenger: &mut Messenger,
        side_effects: &SideEffects,
    ) -> Result<(), GfError> {
        let superstep = side_effects.iteration() as isize;
        let seen = match vertex.property("step")? {
            Some(value) => Some(value.as_isize()?),
            None => None,
        };
        let expected = if superstep == 0 { None } else { Some(superstep - 1) };
        if seen != expected {
            side_effects.and_bool("isolated", false)?;
        }
        vertex.set("step", PropertyValue::Isize(superstep))
    }

    fn terminate(&self, side_effects: &SideEffects) -> bool {
        side_effects.iteration() >= 2
    }

    fn element_compute_keys(&self) -> HashMap<String, KeyType> {
        let mut keys = HashMap::new();
        keys.insert("step".to_owned(), KeyType::Variable);
        keys
    }

    fn features(&self) -> ProgramFeatures {
        ProgramFeatures { requires_all_vertices: true, ..ProgramFeatures::default() }
    }
}

#[test]
fn bsp_writes_are_invisible_until_the_barrier() {
    let result = GraphComputer::new(graph())
        .threads(4)
        .submit(Box::new(IsolationProbe), Vec::new())
        .expect("Submit failed")
        .wait()
        .expect("Computation failed");
    assert_eq!(result.supersteps(), 3);
    assert_eq!(result.side_effects().get("isolated"), Some(PropertyValue::Bool(true)));
}

/// Writes the same value and reads it back within one superstep; only observable under shared
/// isolation.
struct SharedProbe;

impl VertexProgram for SharedProbe {
    fn name(&self) -> &'static str {
        "sharedProbe"
    }

    fn setup(&self, _side_effects: &SideEffects) {}

    fn execute(
        &self,
        vertex: &ComputeVertex,
        _messenger: &mut Messenger,
        side_effects: &SideEffects,
    ) -> Result<(), GfError> {
        vertex.set("x", PropertyValue::Isize(1))?;
        side_effects.and_bool("observed", vertex.property("x")?.is_some())
    }

    fn terminate(&self, _side_effects: &SideEffects) -> bool {
        true
    }

    fn element_compute_keys(&self) -> HashMap<String, KeyType> {
        let mut keys = HashMap::new();
        keys.insert("x".to_owned(), KeyType::Variable);
        keys
    }
}

#[test]
fn shared_isolation_sees_own_writes_immediately() {
    for (isolation, observed) in [(Isolation::Shared, true), (Isolation::Bsp, false)] {
        let result = GraphComputer::new(graph())
            .threads(1)
            .isolation(isolation)
            .submit(Box::new(SharedProbe), Vec::new())
            .expect("Submit failed")
            .wait()
            .expect("Computation failed");
        assert_eq!(
            result.side_effects().get("observed"),
            Some(PropertyValue::Bool(observed)),
            "under {:?}",
            isolation
        );
    }
}

/// Rewrites a CONSTANT key every superstep; the second write must abort the computation.
struct ConstantRewriter;

impl VertexProgram for ConstantRewriter {
    fn name(&self) -> &'static str {
        "constantRewriter"
    }

    fn setup(&self, _side_effects: &SideEffects) {}

    fn execute(
        &self,
        vertex: &ComputeVertex,
        _messenger: &mut Messenger,
        _side_effects: &SideEffects,
    ) -> Result<(), GfError> {
        vertex.set("c", PropertyValue::Isize(1))
    }

    fn terminate(&self, side_effects: &SideEffects) -> bool {
        side_effects.iteration() >= 5
    }

    fn element_compute_keys(&self) -> HashMap<String, KeyType> {
        let mut keys = HashMap::new();
        keys.insert("c".to_owned(), KeyType::Constant);
        keys
    }

    fn features(&self) -> ProgramFeatures {
        ProgramFeatures { requires_all_vertices: true, ..ProgramFeatures::default() }
    }
}

#[test]
fn rewriting_a_constant_key_aborts_the_superstep() {
    let error = GraphComputer::new(graph())
        .threads(1)
        .submit(Box::new(ConstantRewriter), Vec::new())
        .expect("Submit failed")
        .wait()
        .expect_err("Expected a schema violation");
    let message = error.to_string();
    assert!(message.starts_with("[SuperstepFault] Superstep 1"), "{}", message);
    assert!(message.contains("already set"), "{}", message);
}

#[test]
fn undeclared_compute_key_is_a_schema_violation() {
    let result = GraphComputer::new(graph())
        .threads(1)
        .submit(Box::new(SharedProbe), Vec::new())
        .expect("Submit failed")
        .wait()
        .expect("Computation failed");
    let error =
        result.compute_property(0, "undeclared").expect_err("Expected a schema violation");
    assert!(error.to_string().starts_with("[SchemaViolation]"));
}

#[test]
fn combined_inboxes_match_the_uncombined_sum() {
    let messages = vec![
        (2_u32, PropertyValue::Double(0.5)),
        (2, PropertyValue::Double(0.25)),
        (1, PropertyValue::Double(1.0)),
        (2, PropertyValue::Double(0.125)),
    ];
    for permutation in messages.iter().cloned().permutations(messages.len()) {
        let combined = commit_messages(permutation.clone(), Some(&RankSumCombiner))
            .expect("Combine failed");
        assert_eq!(combined[&2], vec![PropertyValue::Double(0.875)]);
        assert_eq!(combined[&1], vec![PropertyValue::Double(1.0)]);
        let uncombined = commit_messages(permutation, None).expect("Commit failed");
        assert_eq!(uncombined[&2].len(), 3);
        assert_eq!(uncombined[&1].len(), 1);
    }
}

#[test]
fn combiner_rejects_mismatched_messages() {
    let messages =
        vec![(1_u32, PropertyValue::Double(0.5)), (1, PropertyValue::Bool(true))];
    let error = commit_messages(messages, Some(&RankSumCombiner))
        .expect_err("Expected a type mismatch");
    assert!(error.to_string().contains("Double"));
}

#[test]
fn feature_mismatch_fails_at_submit() {
    let features =
        ComputerFeatures { supports_all_vertices: false, ..ComputerFeatures::default() };
    let error = GraphComputer::new(graph())
        .features(features)
        .submit(Box::new(PageRankProgram::default()), Vec::new())
        .expect_err("Expected a feature mismatch");
    assert!(error.to_string().contains("all-vertex scheduling"));
}

#[test]
fn programs_survive_the_config_round_trip() {
    let registry = ProgramRegistry::default();
    let programs: Vec<Box<dyn VertexProgram>> = vec![
        Box::new(PageRankProgram::new(0.9, 1e-3, 7).expect("Invalid parameters")),
        Box::new(TraversalProgram::new(vec![
            TraversalOp::Out,
            TraversalOp::Has("lang".to_owned(), PropertyValue::String("java".to_owned())),
            TraversalOp::Values("name".to_owned()),
        ])),
    ];
    for program in programs {
        let mut config = ProgramConfig::default();
        program.store_state(&mut config);
        let bytes = config.to_bytes().expect("Serialization failed");
        let received = ProgramConfig::from_bytes(&bytes).expect("Deserialization failed");
        assert_eq!(config, received);
        let rebuilt = registry.create(&received).expect("Reconstruction failed");
        let mut rebuilt_config = ProgramConfig::default();
        rebuilt.store_state(&mut rebuilt_config);
        assert_eq!(config, rebuilt_config);
    }
}

#[test]
fn unknown_program_name_is_rejected() {
    let mut config = ProgramConfig::default();
    config.set(
        crate::compute::program::PROGRAM_KEY,
        PropertyValue::String("bogus".to_owned()),
    );
    let error =
        ProgramRegistry::default().create(&config).expect_err("Expected an unknown program");
    assert!(error.to_string().contains("bogus"));
}

/// Never terminates on its own; only useful for exercising cancellation.
struct EndlessProgram;

impl VertexProgram for EndlessProgram {
    fn name(&self) -> &'static str {
        "endless"
    }

    fn setup(&self, _side_effects: &SideEffects) {}

    fn execute(
        &self,
        _vertex: &ComputeVertex,
        _messenger: &mut Messenger,
        _side_effects: &SideEffects,
    ) -> Result<(), GfError> {
        std::thread::sleep(std::time::Duration::from_millis(1));
        Ok(())
    }

    fn terminate(&self, _side_effects: &SideEffects) -> bool {
        false
    }

    fn element_compute_keys(&self) -> HashMap<String, KeyType> {
        HashMap::new()
    }

    fn features(&self) -> ProgramFeatures {
        ProgramFeatures { requires_all_vertices: true, ..ProgramFeatures::default() }
    }
}

#[test]
fn cancellation_resolves_at_a_superstep_boundary() {
    let future = GraphComputer::new(graph())
        .threads(2)
        .submit(Box::new(EndlessProgram), Vec::new())
        .expect("Submit failed");
    future.cancel();
    match future.wait() {
        Err(GfError::Cancelled(_)) => {}
        other => panic!("Expected cancellation, got {:?}", other.map(|r| r.supersteps())),
    }
}

/// Fails on one vertex to check that a per-vertex fault aborts the whole computation.
struct FaultyProgram;

impl VertexProgram for FaultyProgram {
    fn name(&self) -> &'static str {
        "faulty"
    }

    fn setup(&self, _side_effects: &SideEffects) {}

    fn execute(
        &self,
        vertex: &ComputeVertex,
        _messenger: &mut Messenger,
        _side_effects: &SideEffects,
    ) -> Result<(), GfError> {
        if vertex.id() == 3 {
            return Err(crate::error::computation_error("Deliberate fault"));
        }
        Ok(())
    }

    fn terminate(&self, _side_effects: &SideEffects) -> bool {
        true
    }

    fn element_compute_keys(&self) -> HashMap<String, KeyType> {
        HashMap::new()
    }
}

#[test]
fn vertex_fault_aborts_the_computation() {
    let error = GraphComputer::new(graph())
        .threads(2)
        .submit(Box::new(FaultyProgram), Vec::new())
        .expect("Submit failed")
        .wait()
        .expect_err("Expected a superstep fault");
    let message = error.to_string();
    assert!(message.starts_with("[SuperstepFault] Superstep 0"), "{}", message);
    assert!(message.contains("Deliberate fault"), "{}", message);
}

/// Does nothing; a carrier for standalone MapReduce jobs.
struct NoopProgram;

impl VertexProgram for NoopProgram {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn setup(&self, _side_effects: &SideEffects) {}

    fn execute(
        &self,
        _vertex: &ComputeVertex,
        _messenger: &mut Messenger,
        _side_effects: &SideEffects,
    ) -> Result<(), GfError> {
        Ok(())
    }

    fn terminate(&self, _side_effects: &SideEffects) -> bool {
        true
    }

    fn element_compute_keys(&self) -> HashMap<String, KeyType> {
        HashMap::new()
    }
}

/// Counts vertices per label through all three stages.
struct LabelCount;

impl MapReduce for LabelCount {
    fn name(&self) -> &'static str {
        "labelCount"
    }

    fn side_effect_key(&self) -> String {
        "labelCount".to_owned()
    }

    fn do_stage(&self, _stage: Stage) -> bool {
        true
    }

    fn map(&self, vertex: &ComputeVertex, emitter: &mut KeyValueEmitter) -> Result<(), GfError> {
        if let Some(label) = vertex.label() {
            emitter.emit(PropertyValue::String(label.to_owned()), PropertyValue::Isize(1));
        }
        Ok(())
    }

    fn reduce(
        &self,
        key: &PropertyValue,
        values: Vec<PropertyValue>,
        emitter: &mut KeyValueEmitter,
    ) -> Result<(), GfError> {
        let mut total = 0;
        for value in values {
            total += value.as_isize()?;
        }
        emitter.emit(key.clone(), PropertyValue::Isize(total));
        Ok(())
    }
}

#[test]
fn map_reduce_with_combine_and_reduce_stages() {
    let result = GraphComputer::new(graph())
        .threads(3)
        .submit(Box::new(NoopProgram), vec![Box::new(LabelCount)])
        .expect("Submit failed")
        .wait()
        .expect("Computation failed");
    let pairs = result.side_effects().get("labelCount").expect("Expected the count side effect");
    assert_eq!(
        pairs,
        PropertyValue::List(vec![
            PropertyValue::pair(
                PropertyValue::String("person".to_owned()),
                PropertyValue::Isize(4)
            ),
            PropertyValue::pair(
                PropertyValue::String("software".to_owned()),
                PropertyValue::Isize(2)
            ),
        ])
    );
}

#[test]
fn handles_format_for_diagnostics() {
    let program: Box<dyn VertexProgram> = Box::new(PageRankProgram::default());
    assert_eq!(format!("{:?}", program), "VertexProgram(pageRank)");
    let future = GraphComputer::new(graph())
        .submit(Box::new(NoopProgram), Vec::new())
        .expect("Submit failed");
    assert!(format!("{:?}", future).contains("cancelled"));
    let result = future.wait().expect("Computation failed");
    assert!(format!("{:?}", result).contains("supersteps"));
}

#[test]
fn empty_graph_finishes_without_supersteps() {
    let graph: Arc<dyn GraphStore + Send + Sync> = Arc::new(Graph::default());
    let result = GraphComputer::new(graph)
        .submit(Box::new(NoopProgram), Vec::new())
        .expect("Submit failed")
        .wait()
        .expect("Computation failed");
    assert_eq!(result.supersteps(), 0);
}

#[test]
fn olap_traversal_matches_the_iterator_pipeline() {
    let program =
        TraversalProgram::new(vec![TraversalOp::Out, TraversalOp::Values("name".to_owned())]);
    let result = GraphComputer::new(graph())
        .threads(4)
        .submit(Box::new(program), Vec::new())
        .expect("Submit failed")
        .wait()
        .expect("Computation failed");
    let olap: Vec<PropertyValue> = result
        .side_effect_traversal(TRAVERSERS)
        .expect("Expected the traverser side effect")
        .to_list()
        .expect("Traversal failed")
        .into_iter()
        .sorted()
        .collect();
    let oltp: Vec<PropertyValue> = Traversal::over(graph())
        .vertices()
        .out()
        .values("name")
        .to_list()
        .expect("Traversal failed")
        .into_iter()
        .sorted()
        .collect();
    assert_eq!(olap, oltp);
    assert_eq!(olap.len(), 6);
}

#[test]
fn olap_traversal_halts_by_vote() {
    let program = TraversalProgram::new(vec![
        TraversalOp::Out,
        TraversalOp::Has("lang".to_owned(), PropertyValue::String("java".to_owned())),
        TraversalOp::Values("name".to_owned()),
    ]);
    let result = GraphComputer::new(graph())
        .threads(2)
        .submit(Box::new(program), Vec::new())
        .expect("Submit failed")
        .wait()
        .expect("Computation failed");
    // One scatter superstep plus one quiet superstep that triggers the halt vote.
    assert_eq!(result.supersteps(), 2);
    let names = result.side_effects().get(TRAVERSERS).expect("Expected halted traversers");
    let names: Vec<PropertyValue> =
        names.as_list().expect("Expected a list").iter().cloned().sorted().collect();
    let expected: Vec<PropertyValue> = ["lop", "lop", "lop", "ripple"]
        .iter()
        .map(|name| PropertyValue::String((*name).to_owned()))
        .collect();
    assert_eq!(names, expected);
}

#[test]
fn invalid_page_rank_parameters_are_rejected() {
    assert!(PageRankProgram::new(1.5, 1e-6, 10).is_err());
    assert!(PageRankProgram::new(0.85, 0.0, 10).is_err());
    assert!(PageRankProgram::new(0.85, 1e-6, 0).is_err());
}

#[test]
fn side_effect_compute_keys_are_declared() {
    let program = PageRankProgram::default();
    let keys: HashSet<String> = program.side_effect_compute_keys();
    assert!(keys.contains("pageRank.delta"));
    assert_eq!(program.element_compute_keys().get(PAGE_RANK), Some(&KeyType::Variable));
    assert_eq!(program.element_compute_keys().get(OUT_DEGREE), Some(&KeyType::Constant));
}
