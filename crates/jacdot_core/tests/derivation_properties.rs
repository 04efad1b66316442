use jacdot_core::derivation::{coefficient, time_elimination};
use jacdot_core::equation_engine::{evaluate, parse};
use jacdot_core::subs::Substitution;
use jacdot_core::{derive, Expr, Language, Printer, Symbol, TimeFunction};

/// Prints in Plain notation and parses the text back.
fn rendered(expr: &Expr) -> Expr {
    let text = Printer::new(Language::Plain).print(expr).unwrap();
    parse(&text).unwrap()
}

fn theta_coefficient(theta: f64) -> f64 {
    (1.0 - (theta / 2.0) * theta.sin() / (1.0 - theta.cos())) / (theta * theta)
}

#[test]
fn coefficient_rate_matches_chain_rule_numerically() {
    let rate_expr = rendered(&derive().coefficient_rate);
    let h = 1e-6;
    for (theta, rate) in [(0.4_f64, 1.0), (1.2, -0.7), (2.0, 3.5), (3.0, 0.25)] {
        let symbolic = evaluate(&rate_expr, &[("theta", theta), ("theta_dot", rate)]).unwrap();
        let slope = (theta_coefficient(theta + h) - theta_coefficient(theta - h)) / (2.0 * h);
        assert!(
            (symbolic - slope * rate).abs() < 1e-7,
            "theta = {theta}: {symbolic} vs {}",
            slope * rate
        );
    }
}

#[test]
fn rendered_coefficient_rate_parses_back_to_the_same_values() {
    let d = derive();
    let reparsed = rendered(&d.coefficient_rate);
    for (theta, rate) in [(0.5_f64, 2.0), (2.7, -1.0)] {
        let vars = [("theta", theta), ("theta_dot", rate)];
        let direct = evaluate(&d.coefficient_rate, &vars).unwrap();
        let parsed = evaluate(&reparsed, &vars).unwrap();
        assert!((direct - parsed).abs() < 1e-12 * direct.abs().max(1.0));
    }
}

#[test]
fn angle_rate_matches_the_derivative_of_a_helix_norm() {
    let rate_expr = rendered(&derive().angle_rate);
    for t in [0.3_f64, 1.0, 2.2] {
        let vars = [
            ("phi0", t.sin()),
            ("phi1", t.cos()),
            ("phi2", t),
            ("phi0_dot", t.cos()),
            ("phi1_dot", -t.sin()),
            ("phi2_dot", 1.0),
        ];
        let rate = evaluate(&rate_expr, &vars).unwrap();
        let expected = t / (1.0 + t * t).sqrt();
        assert!((rate - expected).abs() < 1e-12, "t = {t}");
    }
}

#[test]
fn orthogonal_motion_leaves_the_angle_unchanged() {
    let d = derive();
    let vars = [
        ("phi0", 1.0),
        ("phi1", 0.0),
        ("phi2", 0.0),
        ("phi0_dot", 0.0),
        ("phi1_dot", 1.0),
        ("phi2_dot", 0.0),
    ];
    assert_eq!(evaluate(&rendered(&d.angle_rate), &vars).unwrap(), 0.0);
    let compact = [&vars[..], &[("theta", 1.0)][..]].concat();
    assert_eq!(
        evaluate(&rendered(&d.angle_rate_compact), &compact).unwrap(),
        0.0
    );
}

#[test]
fn substituting_the_base_function_first_strands_its_derivative() {
    let t = Symbol::real("t");
    let theta = Symbol::real("theta");
    let theta_dot = Symbol::real("theta_dot");
    let theta_fn = TimeFunction::real("theta", &t);
    let rate_in_time = coefficient(&Expr::function(&theta_fn)).diff(&t);

    let base_first = Substitution::new()
        .rule(&theta_fn, &theta)
        .rule(
            Expr::derivative(Expr::function(&theta_fn), &t, 1),
            &theta_dot,
        );
    let stranded = base_first.apply(&rate_in_time);
    assert!(stranded.has_derivative());
    assert!(!stranded.is_time_free());

    let derivative_first = time_elimination(&[(theta_fn, theta, theta_dot)]);
    let clean = derivative_first.apply(&rate_in_time);
    assert!(clean.is_time_free());
    assert_eq!(clean, derive().coefficient_rate);
}

#[test]
fn derivation_is_deterministic() {
    let first = derive();
    let second = derive();
    assert_eq!(first, second);
    for language in [Language::Plain, Language::Python, Language::C, Language::Rust] {
        let printer = Printer::new(language);
        assert_eq!(
            first.render(&printer, true).unwrap(),
            second.render(&printer, true).unwrap()
        );
    }
}
