// tests/config_properties.rs

use proptest::prelude::*;

use habprov::config::{parse_bind, validate_config};
use habprov::errors::ConfigProblem;
use habprov::types::{Topology, UpdateStrategy};
use habprov_test_utils::builders::{ConfigBuilder, ServiceBuilder};

fn is_strategy(s: &str) -> bool {
    UpdateStrategy::ALL.iter().any(|v| v.as_str() == s)
}

fn is_topology(s: &str) -> bool {
    Topology::ALL.iter().any(|v| v.as_str() == s)
}

proptest! {
    #[test]
    fn unknown_enum_values_give_one_problem_each(
        strategy in "[A-Za-z-]{1,12}",
        topology in "[A-Za-z-]{1,12}",
    ) {
        prop_assume!(!is_strategy(&strategy) && !is_topology(&topology));

        let raw = ConfigBuilder::new("10.0.0.5")
            .with_service(
                ServiceBuilder::new("core/redis")
                    .strategy(&strategy)
                    .topology(&topology)
                    .build(),
            )
            .build_raw();

        let problems = validate_config(&raw);
        prop_assert_eq!(problems.len(), 2);
        prop_assert!(
            matches!(&problems[0], ConfigProblem::InvalidStrategy { message, .. } if message.contains(&strategy)),
            "expected InvalidStrategy first, got {:?}", problems
        );
        prop_assert!(
            matches!(&problems[1], ConfigProblem::InvalidTopology { message, .. } if message.contains(&topology)),
            "expected InvalidTopology second, got {:?}", problems
        );
    }

    #[test]
    fn well_formed_binds_parse_back_to_their_parts(
        alias in "[a-z][a-z0-9_-]{0,8}",
        service in "[a-z][a-z0-9_-]{0,8}",
        group in "[a-z][a-z0-9_-]{0,8}",
    ) {
        let bind = parse_bind(&format!("{alias}:{service}.{group}"));
        prop_assert!(bind.is_some());
        let bind = bind.unwrap();
        prop_assert_eq!(bind.alias, alias);
        prop_assert_eq!(bind.service, service);
        prop_assert_eq!(bind.group, group);
    }

    #[test]
    fn bind_strings_parse_only_with_exactly_three_pieces(
        pieces in proptest::collection::vec("[a-z][a-z0-9_-]{0,5}", 0..6),
        separators in proptest::collection::vec(prop_oneof![Just(":"), Just("."), Just("::")], 5),
    ) {
        let mut s = String::new();
        for (i, piece) in pieces.iter().enumerate() {
            if i > 0 {
                s.push_str(separators[i - 1]);
            }
            s.push_str(piece);
        }

        let bind = parse_bind(&s);
        if pieces.len() == 3 {
            let bind = bind.expect("three pieces always parse");
            prop_assert_eq!(&bind.alias, &pieces[0]);
            prop_assert_eq!(&bind.service, &pieces[1]);
            prop_assert_eq!(&bind.group, &pieces[2]);
        } else {
            prop_assert!(bind.is_none(), "{} parsed as {:?}", s, bind);
        }
    }
}
