//! Pipeline orchestration and E2E integration tests.

mod common;

use common::*;
use pretty_assertions::assert_eq;

use sift_core::config::AnalysisConfig;
use sift_core::element::ElementKind;
use sift_core::graph::EntityType;
use sift_core::model::{ClassNode, FieldNode, MethodNode, TypeName};
use sift_core::pipeline::{
    run_pipeline, Action, Pipeline, Predicate, PropertySpec, PropertyStrategy, ScopeKind,
};
use sift_core::signature::SignatureError;
use sift_core::SiftError;

// ===========================================================================
// Fixture pipeline (6 tests)
// ===========================================================================

#[test]
fn fixture_registers_every_entity_type() {
    let result = run_fixture("petclinic");
    assert_eq!(labels_of(&result, "repository"), vec!["OwnerRepository"]);
    assert_eq!(labels_of(&result, "model"), vec!["Owner", "Pet", "Vet"]);
    assert_eq!(
        labels_of(&result, "controller"),
        vec!["OwnerController", "VetController"]
    );
    assert_eq!(
        labels_of(&result, "endpoint"),
        vec!["GET /owners", "GET /owners/{id}", "GET /vets"]
    );
    assert_eq!(result.entities.len(), 9);
}

#[test]
fn fixture_associates_endpoints_with_their_controller() {
    let result = run_fixture("petclinic");
    let owners = entity_labelled(&result, "controller", "OwnerController");
    let vets = entity_labelled(&result, "controller", "VetController");
    assert_eq!(
        child_labels(&result, owners, "endpoints"),
        vec!["GET /owners", "GET /owners/{id}"]
    );
    assert_eq!(child_labels(&result, vets, "endpoints"), vec!["GET /vets"]);
    assert_eq!(owners.property_text("path"), Some("/owners".to_string()));
    assert!(vets.property("path").is_none());
}

#[test]
fn fixture_relates_endpoints_through_calls() {
    let result = run_fixture("petclinic");
    let list = entity_labelled(&result, "endpoint", "GET /owners");
    let show = entity_labelled(&result, "endpoint", "GET /owners/{id}");
    let vets = entity_labelled(&result, "endpoint", "GET /vets");
    let repo = entity_labelled(&result, "repository", "OwnerRepository");

    assert_eq!(child_labels(&result, list, "invokes"), vec!["OwnerRepository"]);
    assert_eq!(child_labels(&result, show, "invokes"), vec!["OwnerRepository"]);
    assert!(child_labels(&result, vets, "invokes").is_empty());
    assert_eq!(
        child_labels(&result, repo, "backtrack"),
        vec!["GET /owners", "GET /owners/{id}"]
    );
    assert_eq!(child_labels(&result, vets, "creates"), vec!["Vet"]);
    assert_eq!(result.entities.relation_count(), 8);
}

#[test]
fn fixture_resolves_generic_return_types() {
    let result = run_fixture("petclinic");
    let list = entity_labelled(&result, "endpoint", "GET /owners");
    let show = entity_labelled(&result, "endpoint", "GET /owners/{id}");
    assert_eq!(list.property_text("returns"), Some("List<Owner>".to_string()));
    assert_eq!(show.property_text("returns"), Some("Owner".to_string()));
    assert_eq!(result.signature_fallbacks, 0);
}

#[test]
fn fixture_measurements_mirror_the_action_tree() {
    let result = run_fixture("petclinic");
    assert_eq!(result.measurements.len(), 1);
    let root = &result.measurements[0];
    assert_eq!(root.action, "chain[5]");
    assert_eq!(root.children.len(), 5);
    assert_eq!(root.children[0].action, "nested");
    assert_eq!(root.entities_delta, 9);
    assert!(root.failure_path().is_none());
    assert_eq!(root.scope_in, ScopeKind::Template);
}

#[test]
fn fixture_pipeline_json_round_trips() {
    let pipeline = load_pipeline("petclinic");
    let json = pipeline.to_json().unwrap();
    assert_eq!(Pipeline::from_json(&json).unwrap(), pipeline);
}

// ===========================================================================
// Controller and endpoint (2 tests)
// ===========================================================================

fn single_controller() -> Vec<ClassNode> {
    vec![class("app.HelloController")
        .with_annotation(annotation("web.Controller"))
        .with_method(
            MethodNode::new("hello", "()Ljava/lang/String;")
                .with_annotation(annotation_with_value("web.GetMapping", "/hello")),
        )
        .with_method(MethodNode::new("helper", "()V"))]
}

fn controller_pipeline() -> Pipeline {
    Pipeline::new(
        "controllers",
        Action::chain(vec![
            Action::Classes,
            Action::filter(Predicate::annotated_by("web.Controller")),
            Action::register("controller"),
            Action::methods(),
            Action::filter(Predicate::annotated_by("web.GetMapping")),
            Action::register_with(
                "endpoint",
                Some("${path}"),
                vec![PropertySpec::annotation_value("path", "web.GetMapping")],
            ),
            Action::associate("controller", "endpoints", "endpoint"),
        ]),
    )
}

#[test]
fn one_controller_with_one_endpoint() {
    let result = run_pipeline(
        &AnalysisConfig::default(),
        single_controller(),
        &controller_pipeline(),
    )
    .unwrap();
    let controllers = result.entities.entities_of(&EntityType::new("controller"));
    assert_eq!(controllers.len(), 1);
    let children = result.entities.children(controllers[0].id);
    assert_eq!(children.len(), 1);
    assert_eq!(children["endpoints"].len(), 1);
    assert_eq!(
        child_labels(&result, controllers[0], "endpoints"),
        vec!["/hello"]
    );
    assert_eq!(
        result.entities.kind_of(&EntityType::new("endpoint")),
        Some(ElementKind::Method)
    );
}

#[test]
fn explain_walks_back_to_the_class() {
    let result = run_pipeline(
        &AnalysisConfig::default(),
        single_controller(),
        &controller_pipeline(),
    )
    .unwrap();
    let endpoint = entity_labelled(&result, "endpoint", "/hello");
    let lines = result.explain(endpoint.element);
    assert!(lines[0].ends_with("method HelloController::hello"));
    assert!(lines.iter().any(|l| l.ends_with("class HelloController")));
}

// ===========================================================================
// Combinators and scopes (6 tests)
// ===========================================================================

#[test]
fn fork_routes_each_partition() {
    let pipeline = Pipeline::new(
        "fork",
        Action::chain(vec![
            Action::Classes,
            Action::fork(
                Predicate::annotated_by("web.Controller"),
                Action::register("controller"),
                Some(Action::register("other")),
            ),
        ]),
    );
    let result = run_pipeline(
        &AnalysisConfig::default(),
        load_classes("petclinic"),
        &pipeline,
    )
    .unwrap();
    assert_eq!(labels_of(&result, "controller").len(), 2);
    assert_eq!(labels_of(&result, "other").len(), 5);
}

#[test]
fn outer_scope_and_ascend_reach_the_class() {
    let select_endpoints = || {
        vec![
            Action::Classes,
            Action::methods(),
            Action::filter(Predicate::annotated_by("web.GetMapping")),
        ]
    };
    let mut outer = select_endpoints();
    outer.push(Action::register("endpoint"));
    outer.push(Action::outer_scope(
        ScopeKind::Class,
        Action::register("controller"),
    ));
    outer.push(Action::associate("controller", "endpoints", "endpoint"));
    let result = run_pipeline(
        &AnalysisConfig::default(),
        load_classes("petclinic"),
        &Pipeline::new("outer", Action::chain(outer)),
    )
    .unwrap();
    assert_eq!(
        labels_of(&result, "controller"),
        vec!["OwnerController", "VetController"]
    );
    assert_eq!(labels_of(&result, "endpoint").len(), 3);
    assert_eq!(result.entities.relation_count(), 3);

    let mut ascend = select_endpoints();
    ascend.push(Action::Ascend {
        kind: ScopeKind::Class,
    });
    ascend.push(Action::register("controller"));
    let result = run_pipeline(
        &AnalysisConfig::default(),
        load_classes("petclinic"),
        &Pipeline::new("ascend", Action::chain(ascend)),
    )
    .unwrap();
    assert_eq!(labels_of(&result, "controller").len(), 2);
}

#[test]
fn explode_type_synthesizes_missing_classes() {
    let pipeline = Pipeline::new(
        "types",
        Action::chain(vec![
            Action::Classes,
            Action::filter(Predicate::name(r"^app\.Owner$")),
            Action::fields(),
            Action::ExplodeType { synthesize: true },
            Action::register("type"),
        ]),
    );
    let result = run_pipeline(
        &AnalysisConfig::default(),
        load_classes("petclinic"),
        &pipeline,
    )
    .unwrap();
    let types = result.entities.entities_of(&EntityType::new("type"));
    assert_eq!(types.len(), 2);
    assert!(types.iter().all(|t| t.element.is_synthetic()));
    assert_eq!(labels_of(&result, "type"), vec!["List", "String"]);
    assert!(result.elements.synthetic_count() > 0);
}

#[test]
fn type_arguments_reach_generic_element_types() {
    let pipeline = Pipeline::new(
        "pets",
        Action::chain(vec![
            Action::Classes,
            Action::filter(Predicate::name(r"^app\.Owner$")),
            Action::fields(),
            Action::filter(Predicate::name("^pets$")),
            Action::Signature,
            Action::TypeArguments,
            Action::ExplodeType { synthesize: false },
            Action::register("collected"),
        ]),
    );
    let result = run_pipeline(
        &AnalysisConfig::default(),
        load_classes("petclinic"),
        &pipeline,
    )
    .unwrap();
    assert_eq!(labels_of(&result, "collected"), vec!["Pet"]);
    let pet = entity_labelled(&result, "collected", "Pet");
    assert!(result
        .explain(pet.element)
        .iter()
        .any(|l| l.ends_with("field Owner.pets")));
}

#[test]
fn synthesized_classes_can_carry_entities() {
    let methods: &[&str] = &["send"];
    let pipeline = Pipeline::new(
        "external",
        Action::chain(vec![
            Action::synthesize(&[("ext.Mailer", methods)]),
            Action::register("external"),
            Action::methods(),
            Action::register("operation"),
        ]),
    );
    let classes = vec![class("app.Signup").with_field(FieldNode::new("mailer", "Lext/Mailer;"))];
    let result = run_pipeline(&AnalysisConfig::default(), classes, &pipeline).unwrap();
    let external = entity_labelled(&result, "external", "Mailer");
    assert!(external.element.is_synthetic());
    assert_eq!(labels_of(&result, "operation"), vec!["Mailer::send"]);
    assert_eq!(
        result.elements.class_by_name(&TypeName::new("ext.Mailer")),
        Some(external.element)
    );
}

fn generic_repository() -> Vec<ClassNode> {
    vec![
        class("data.Crud")
            .with_signature("<T:Ljava/lang/Object;>Ljava/lang/Object;")
            .with_method(
                MethodNode::new("save", "(Ljava/lang/Object;)Ljava/lang/Object;")
                    .with_signature("<S:TT;>(TS;)TS;"),
            )
            .with_method(
                MethodNode::new("all", "()Ljava/util/List;")
                    .with_signature("()Ljava/util/List<TT;>;"),
            ),
        class("app.OwnerRepo")
            .with_super(&TypeName::new("data.Crud"))
            .with_signature("Ldata/Crud<Lapp/Owner;>;"),
        class("app.Owner"),
    ]
}

fn inherited_finders() -> Vec<Action> {
    vec![
        Action::Classes,
        Action::filter(Predicate::name(r"^app\.OwnerRepo$")),
        Action::Methods { inherited: true },
        Action::register_with(
            "finder",
            None,
            vec![PropertySpec::new("returns", PropertyStrategy::ResolvedType)],
        ),
    ]
}

#[test]
fn inherited_generic_methods_keep_method_variables() {
    let pipeline = Pipeline::new("finders", Action::chain(inherited_finders()));
    let result =
        run_pipeline(&AnalysisConfig::default(), generic_repository(), &pipeline).unwrap();
    let mut returns: Vec<String> = result
        .entities
        .entities_of(&EntityType::new("finder"))
        .iter()
        .filter_map(|e| e.property_text("returns"))
        .collect();
    returns.sort();
    assert_eq!(returns, vec!["List<Owner>".to_string(), "S".to_string()]);
    assert_eq!(result.signature_fallbacks, 0);
}

// ===========================================================================
// Failures (4 tests)
// ===========================================================================

fn orphan_pipeline() -> Pipeline {
    Pipeline::new(
        "orphans",
        Action::chain(vec![
            Action::Classes,
            Action::filter(Predicate::name(r"\.Vet$")),
            Action::register("endpoint"),
            Action::associate("controller", "endpoints", "endpoint"),
        ]),
    )
}

#[test]
fn orphan_child_fails_with_partial_measurements() {
    let failure = run_pipeline(
        &AnalysisConfig::default(),
        load_classes("petclinic"),
        &orphan_pipeline(),
    )
    .unwrap_err();
    assert!(matches!(
        failure.error,
        SiftError::FailedToResolveParentRelation { .. }
    ));
    assert_eq!(
        failure.action,
        "chain[4] > associate(controller[endpoints] = endpoint)"
    );
    let root = &failure.measurements[0];
    assert!(root.failed);
    assert_eq!(
        root.failure_path(),
        Some(vec!["chain[4]", "associate(controller[endpoints] = endpoint)"])
    );
    assert_eq!(root.children.len(), 4);
    assert!(!root.children[2].failed);
    assert_eq!(root.entities_delta, 1);
}

#[test]
fn lenient_relations_skip_orphans() {
    let config = AnalysisConfig {
        strict_relations: false,
        ..Default::default()
    };
    let result = run_pipeline(&config, load_classes("petclinic"), &orphan_pipeline()).unwrap();
    assert_eq!(result.entities.len(), 1);
    assert_eq!(result.entities.relation_count(), 0);
}

#[test]
fn mismatched_scope_is_an_illegal_cast() {
    let pipeline = Pipeline::new(
        "cast",
        Action::chain(vec![Action::Classes, Action::Parameters]),
    );
    let failure = run_pipeline(
        &AnalysisConfig::default(),
        load_classes("petclinic"),
        &pipeline,
    )
    .unwrap_err();
    assert!(matches!(
        failure.error,
        SiftError::IllegalGenericCast {
            expected: ScopeKind::Method,
            found: ScopeKind::Class,
        }
    ));
    assert_eq!(failure.action, "chain[2] > parameters");
    assert!(failure.to_string().contains("parameters"));
}

#[test]
fn exploding_a_call_site_type_fails_the_run() {
    let mut actions = inherited_finders();
    actions.push(Action::ExplodeType { synthesize: true });
    let pipeline = Pipeline::new("explode", Action::chain(actions));
    let failure =
        run_pipeline(&AnalysisConfig::default(), generic_repository(), &pipeline).unwrap_err();
    match &failure.error {
        SiftError::SignatureParsing(SignatureError::CallSiteResolution { name, .. }) => {
            assert_eq!(name, "S");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(failure.action, "chain[5] > explode_type");
}
