use fr_core::{FrError, ParamTag, Parameter, ParameterDef, ParameterSet, Prior, Stage, UNKNOWN_PARAMETER};
use proptest::prelude::*;

const TAGS: [ParamTag; 6] = [
    ParamTag::None,
    ParamTag::Nuisance,
    ParamTag::MixingAngle,
    ParamTag::Scale,
    ParamTag::SourceAngle,
    ParamTag::BestFit,
];

fn build(tags: &[ParamTag]) -> ParameterSet {
    ParameterSet::from_defs(tags.iter().enumerate().map(|(idx, tag)| {
        ParameterDef::new(format!("p{idx}"), idx as f64, [-10.0, 10.0], 1.0, Prior::None, *tag)
    }))
    .unwrap()
}

#[test]
fn writes_through_filtered_view_reach_the_full_set() {
    let set = build(&[ParamTag::Nuisance, ParamTag::Scale, ParamTag::Nuisance]);
    let nuisance = set.from_tag(&[ParamTag::Nuisance], false);
    nuisance.by_name("p2").unwrap().set_value(-4.5);
    assert_eq!(set.by_name("p2").unwrap().value(), -4.5);
    assert!(nuisance.get(1).unwrap().same_as(set.get(2).unwrap()));
}

#[test]
fn held_handle_sees_set_binding() {
    let set = build(&[ParamTag::MixingAngle, ParamTag::Scale]);
    let held: Parameter = set.by_name("p1").unwrap().clone();
    set.set_values(&[1.5, 2.5]).unwrap();
    assert_eq!(held.value(), 2.5);
}

#[test]
fn unknown_name_is_a_lookup_failure() {
    let set = build(&[ParamTag::Nuisance]);
    let err = set.by_name("absent").unwrap_err();
    assert!(matches!(err, FrError::Configuration(_)));
    assert_eq!(err.info().code, UNKNOWN_PARAMETER);
    assert_eq!(err.info().context["name"], "absent");
    assert_eq!(err.stage(), Stage::Setup);
    assert!(!err.is_forbidden());
}

#[test]
fn derived_views_follow_order() {
    let set = ParameterSet::from_defs(vec![
        ParameterDef::new("b", 0.1, [0.0, 1.0], 0.2, Prior::None, ParamTag::None).with_tex("beta"),
        ParameterDef::new("a", 0.2, [0.0, 2.0], 0.2, Prior::None, ParamTag::None),
    ])
    .unwrap();
    assert_eq!(set.names(), vec!["b", "a"]);
    assert_eq!(set.labels(), vec!["beta", "a"]);
    assert_eq!(set.values(), vec![0.1, 0.2]);
    assert_eq!(set.ranges(), vec![[0.0, 1.0], [0.0, 2.0]]);
    assert_eq!(set.index_of("a"), Some(1));
}

#[test]
fn definitions_load_from_yaml() {
    let yaml = r#"
- name: logLam
  value: -30.0
  ranges: [-40.0, -20.0]
  std: 3.0
  tag: scale
- name: convNorm
  value: 1.0
  ranges: [0.0, 50.0]
  std: 0.3
  prior: gaussian
  tag: nuisance
  seed: [0.5, 2.0]
"#;
    let defs: Vec<ParameterDef> = serde_yaml::from_str(yaml).unwrap();
    let set = ParameterSet::from_defs(defs).unwrap();
    assert_eq!(set.by_name("logLam").unwrap().tag(), ParamTag::Scale);
    assert_eq!(set.by_name("convNorm").unwrap().prior(), Prior::Gaussian);
    assert_eq!(set.by_name("convNorm").unwrap().seed(), [0.5, 2.0]);
    assert_eq!(set.by_name("logLam").unwrap().seed(), [-40.0, -20.0]);
}

proptest! {
    #[test]
    fn tag_filter_partitions_the_set(
        picks in proptest::collection::vec(0usize..6, 1..12),
        selected in proptest::collection::vec(0usize..6, 1..3),
    ) {
        let tags: Vec<ParamTag> = picks.iter().map(|idx| TAGS[*idx]).collect();
        let set = build(&tags);
        let query: Vec<ParamTag> = selected.iter().map(|idx| TAGS[*idx]).collect();

        let kept = set.from_tag(&query, false).names();
        let dropped = set.from_tag(&query, true).names();
        prop_assert_eq!(kept.len() + dropped.len(), set.len());

        let all = set.names();
        let in_order = |sub: &[String]| {
            let positions: Vec<usize> = sub.iter().map(|n| set.index_of(n).unwrap()).collect();
            positions.windows(2).all(|w| w[0] < w[1])
        };
        prop_assert!(in_order(&kept));
        prop_assert!(in_order(&dropped));
        for name in &all {
            let count = kept.iter().filter(|n| *n == name).count()
                + dropped.iter().filter(|n| *n == name).count();
            prop_assert_eq!(count, 1);
        }
    }
}
