use olm_core::errors::ErrorInfo;
use olm_core::{
    CovarianceMatrix, OlmError, PhaseIndex, PhaseMap, PhaseVector, ProbeView, Species, Twiss,
};
use olm_elem::{Drift, Element, ElementKind, Marker, Quadrupole, RfGap, SectorDipole};
use olm_probe::{
    DiagnosticProbe, EnsembleProbe, EnvelopeProbe, ParticleProbe, Probe, Trajectory,
    TransferMapProbe, TwissProbe,
};
use olm_track::{step_count, Tracker, TrackerConfig, UpdatePolicy};
use proptest::prelude::*;

fn config(step_size: f64, policy: UpdatePolicy, space_charge: bool) -> TrackerConfig {
    TrackerConfig {
        step_size,
        space_charge,
        update_policy: policy,
        ..TrackerConfig::default()
    }
}

fn beam() -> CovarianceMatrix {
    let t = Twiss::new(0.0, 1.0, 1.0e-6);
    CovarianceMatrix::from_twiss(&t, &t, &t).unwrap()
}

fn run(tracker: &Tracker, probe: &mut Probe, elements: &[&dyn Element]) -> Trajectory {
    let mut trajectory = Trajectory::new();
    for element in elements {
        tracker.propagate(probe, *element, &mut trajectory).unwrap();
    }
    trajectory
}

#[test]
fn particle_drift_reaches_exit_on_axis() {
    let tracker = Tracker::for_probe(
        olm_probe::ProbeKind::Particle,
        config(0.1, UpdatePolicy::Exit, false),
    )
    .unwrap();
    let mut probe = Probe::from(ParticleProbe::new(Species::proton(2.5e6), PhaseVector::zero()));
    let drift = Drift::new("D1", 1.0).unwrap();
    let trajectory = run(&tracker, &mut probe, &[&drift]);

    assert_eq!(trajectory.len(), 1);
    let exit = trajectory.final_state().unwrap();
    assert!((exit.position - 1.0).abs() < 1e-12);
    assert_eq!(exit.element_id, "D1");
    let centroid = exit.centroid().unwrap();
    assert_eq!(centroid.get(PhaseIndex::X), 0.0);
    assert_eq!(centroid.get(PhaseIndex::Y), 0.0);
    assert!(exit.time > 0.0);
}

#[test]
fn always_policy_records_every_sub_step() {
    let tracker = Tracker::Particle(config(0.1, UpdatePolicy::Always, false));
    let mut probe = Probe::from(ParticleProbe::new(Species::proton(2.5e6), PhaseVector::zero()));
    let drift = Drift::new("D1", 1.0).unwrap();
    let quad = Quadrupole::new("Q1", 0.5, 2.0).unwrap();
    let trajectory = run(&tracker, &mut probe, &[&drift, &quad]);

    // Ten drift steps, one quadrupole step without space charge.
    assert_eq!(trajectory.len(), 11);
    assert_eq!(trajectory.states_for_element("D1").len(), 10);
    assert!((trajectory.states()[4].position - 0.5).abs() < 1e-12);
    assert!((trajectory.final_state().unwrap().position - 1.5).abs() < 1e-12);
}

#[test]
fn entrance_and_exit_bracket_each_element() {
    let tracker = Tracker::TransferMap(config(0.1, UpdatePolicy::EntranceAndExit, false));
    let mut probe = Probe::from(TransferMapProbe::new(Species::proton(2.5e6)));
    let drift = Drift::new("D1", 0.3).unwrap();
    let marker = Marker::new("M1");
    let trajectory = run(&tracker, &mut probe, &[&drift, &marker]);

    let positions: Vec<f64> = trajectory.iter().map(|s| s.position).collect();
    assert_eq!(positions.len(), 4);
    assert_eq!(positions[0], 0.0);
    assert!((positions[1] - 0.3).abs() < 1e-12);
    assert_eq!(positions[1], positions[2]);
    assert_eq!(trajectory.states_for_element("M1").len(), 2);
    let response = trajectory.final_state().unwrap().response().unwrap();
    assert!((response.get(PhaseIndex::X, PhaseIndex::XP) - 0.3).abs() < 1e-12);
}

#[test]
fn entrance_policy_records_before_stepping() {
    let tracker = Tracker::Particle(config(0.1, UpdatePolicy::Entrance, false));
    let mut probe = Probe::from(ParticleProbe::new(Species::proton(2.5e6), PhaseVector::zero()));
    let drift = Drift::new("D1", 1.0).unwrap();
    let trajectory = run(&tracker, &mut probe, &[&drift]);
    assert_eq!(trajectory.len(), 1);
    assert_eq!(trajectory.final_state().unwrap().position, 0.0);
    assert!((probe.position() - 1.0).abs() < 1e-12);
}

#[test]
fn mismatched_probe_is_rejected() {
    let tracker = Tracker::Particle(TrackerConfig::default());
    let mut probe = Probe::from(EnvelopeProbe::new(Species::proton(2.5e6), beam()));
    let drift = Drift::new("D1", 1.0).unwrap();
    let err = tracker
        .propagate(&mut probe, &drift, &mut Trajectory::new())
        .unwrap_err();
    assert!(matches!(err, OlmError::IncompatibleProbe(_)));
    assert_eq!(err.info().code, "tracker-pairing");
    assert_eq!(probe.position(), 0.0);
}

#[test]
fn diagnostic_counts_each_element_once() {
    let tracker = Tracker::Diagnostic(config(0.01, UpdatePolicy::Exit, true));
    let mut probe = Probe::from(DiagnosticProbe::new(Species::proton(2.5e6)));
    let d1 = Drift::new("D1", 1.0).unwrap();
    let q1 = Quadrupole::new("Q1", 0.2, 5.0).unwrap();
    let m1 = Marker::new("M1");
    run(&tracker, &mut probe, &[&d1, &q1, &m1]);
    match &probe {
        Probe::Diagnostic(diag) => assert_eq!(diag.visited, 3),
        other => panic!("unexpected probe {:?}", other.kind()),
    }
    assert!((probe.position() - 1.2).abs() < 1e-12);
}

#[test]
fn failures_carry_the_element_id() {
    let tracker = Tracker::Particle(TrackerConfig::default());
    let mut probe = Probe::from(ParticleProbe::new(Species::proton(1.0e6), PhaseVector::zero()));
    let gap = RfGap::new("G7", -2.0e6, 0.0, 402.5e6).unwrap();
    let mut trajectory = Trajectory::new();
    let err = tracker.propagate(&mut probe, &gap, &mut trajectory).unwrap_err();
    assert_eq!(err.info().code, "gap-stops-probe");
    assert_eq!(err.info().context.get("element").map(String::as_str), Some("G7"));
    assert!(trajectory.is_empty());
}

#[derive(Debug)]
struct SingularDevice;

impl Element for SingularDevice {
    fn id(&self) -> &str {
        "X1"
    }

    fn kind(&self) -> ElementKind {
        ElementKind::Drift
    }

    fn length(&self) -> f64 {
        0.2
    }

    fn transfer_map(&self, _probe: &ProbeView, _sub_length: f64) -> Result<PhaseMap, OlmError> {
        Err(OlmError::SingularMatrix(ErrorInfo::new(
            "device-singular",
            "device map cannot be built",
        )))
    }
}

#[test]
fn step_failures_surface_as_model_errors() {
    let tracker = Tracker::Particle(config(0.1, UpdatePolicy::Exit, false));
    let mut probe = Probe::from(ParticleProbe::new(Species::proton(2.5e6), PhaseVector::zero()));
    let mut trajectory = Trajectory::new();
    let err = tracker
        .propagate(&mut probe, &SingularDevice, &mut trajectory)
        .unwrap_err();
    assert!(matches!(err, OlmError::Model(_)));
    assert_eq!(err.info().code, "device-singular");
    let context = &err.info().context;
    assert_eq!(context.get("cause_family").map(String::as_str), Some("SingularMatrix"));
    assert_eq!(context.get("element").map(String::as_str), Some("X1"));
}

#[test]
fn space_charge_subdivides_and_expands_the_envelope() {
    let species = Species::proton(2.5e6);
    let quad = Quadrupole::new("Q1", 0.1, 0.0).unwrap();
    let with = Tracker::Envelope(config(0.01, UpdatePolicy::Exit, true));
    let without = Tracker::Envelope(config(0.01, UpdatePolicy::Exit, false));
    assert_eq!(with.plan(&quad).steps, 10);
    assert_eq!(without.plan(&quad).steps, 1);

    let seed = EnvelopeProbe::new(species, beam())
        .with_current(0.05, 402.5e6)
        .unwrap();
    let mut charged = Probe::from(seed.clone());
    let mut neutral = Probe::from(seed);
    let drift = Drift::new("D1", 0.5).unwrap();
    run(&with, &mut charged, &[&quad, &drift]);
    run(&without, &mut neutral, &[&quad, &drift]);

    let size = |probe: &Probe| match probe {
        Probe::Envelope(env) => env.covariance.central_moment(PhaseIndex::X, PhaseIndex::X),
        other => panic!("unexpected probe {:?}", other.kind()),
    };
    assert!(size(&charged) > size(&neutral));
}

#[test]
fn zero_current_envelope_ignores_space_charge() {
    let species = Species::proton(2.5e6);
    let drift = Drift::new("D1", 0.5).unwrap();
    let mut a = Probe::from(EnvelopeProbe::new(species.clone(), beam()));
    let mut b = Probe::from(EnvelopeProbe::new(species, beam()));
    run(&Tracker::Envelope(config(0.05, UpdatePolicy::Exit, true)), &mut a, &[&drift]);
    run(&Tracker::Envelope(config(0.05, UpdatePolicy::Exit, false)), &mut b, &[&drift]);
    match (&a, &b) {
        (Probe::Envelope(x), Probe::Envelope(y)) => {
            assert!(x.covariance.as_matrix().max_abs_diff(y.covariance.as_matrix()) < 1e-18)
        }
        _ => panic!("envelope probes expected"),
    }
}

#[test]
fn coulomb_kicks_spread_the_ensemble() {
    let species = Species::proton(2.5e6);
    let seed = EnsembleProbe::gaussian(species, &beam(), 64, 1.0e-11, 7).unwrap();
    let mut charged = Probe::from(seed.clone());
    let mut neutral = Probe::from(seed);
    let drift = Drift::new("D1", 0.2).unwrap();
    run(&Tracker::Ensemble(config(0.05, UpdatePolicy::Exit, true)), &mut charged, &[&drift]);
    run(&Tracker::Ensemble(config(0.05, UpdatePolicy::Exit, false)), &mut neutral, &[&drift]);

    let spread = |probe: &Probe| match probe {
        Probe::Ensemble(ens) => ens
            .covariance()
            .unwrap()
            .central_moment(PhaseIndex::XP, PhaseIndex::XP),
        other => panic!("unexpected probe {:?}", other.kind()),
    };
    assert!(spread(&charged) > spread(&neutral));
}

proptest! {
    #[test]
    fn positions_never_decrease(
        lengths in prop::collection::vec(0.0f64..0.7, 1..6),
        step in 0.02f64..0.3,
    ) {
        let tracker = Tracker::Particle(config(step, UpdatePolicy::Always, false));
        let mut probe = Probe::from(ParticleProbe::new(
            Species::proton(2.5e6),
            PhaseVector::new(1e-3, 0.0, 0.0, 0.0, 0.0, 0.0),
        ));
        let drifts: Vec<Drift> = lengths
            .iter()
            .enumerate()
            .map(|(i, &l)| Drift::new(format!("D{i}"), l).unwrap())
            .collect();
        let mut trajectory = Trajectory::new();
        for drift in &drifts {
            tracker.propagate(&mut probe, drift, &mut trajectory).unwrap();
        }
        let positions: Vec<f64> = trajectory.iter().map(|s| s.position).collect();
        prop_assert!(positions.windows(2).all(|w| w[0] <= w[1]));
        let total: f64 = lengths.iter().sum();
        prop_assert!((probe.position() - total).abs() < 1e-9);
    }
}

fn lattice_element(choice: u8, index: usize, length: f64, strength: f64) -> Box<dyn Element> {
    let id = format!("E{index}");
    match choice % 3 {
        0 => Box::new(Drift::new(id, length).unwrap()),
        1 => Box::new(Quadrupole::new(id, length, strength).unwrap()),
        _ => Box::new(SectorDipole::new(id, length, strength * 0.01).unwrap()),
    }
}

proptest! {
    #[test]
    fn envelope_covariance_stays_symmetric(
        layout in prop::collection::vec((0u8..3, 0.05f64..0.5, -12.0f64..12.0), 1..8),
        current in 0.0f64..0.05,
    ) {
        let tracker = Tracker::Envelope(config(0.05, UpdatePolicy::Always, true));
        let seed = EnvelopeProbe::new(Species::proton(2.5e6), beam())
            .with_current(current, 402.5e6)
            .unwrap();
        let mut probe = Probe::from(seed);
        let elements: Vec<Box<dyn Element>> = layout
            .iter()
            .enumerate()
            .map(|(i, &(choice, length, strength))| lattice_element(choice, i, length, strength))
            .collect();
        let mut trajectory = Trajectory::new();
        for element in &elements {
            tracker.propagate(&mut probe, element.as_ref(), &mut trajectory).unwrap();
        }
        for state in trajectory.iter() {
            let covariance = state.covariance().unwrap();
            prop_assert!(covariance.as_matrix().max_asymmetry() < 1e-9);
        }
    }

    #[test]
    fn step_count_grows_with_length(
        a in 0.0f64..5.0,
        b in 0.0f64..5.0,
        step in 0.01f64..0.5,
    ) {
        let (short, long) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(
            step_count(ElementKind::Drift, short, step, false)
                <= step_count(ElementKind::Drift, long, step, false)
        );
        let ratio = long / step;
        let fraction = ratio - ratio.floor();
        if long > 0.0 && fraction > 1e-6 && fraction < 1.0 - 1e-6 {
            prop_assert_eq!(
                step_count(ElementKind::Drift, long, step, false),
                ratio.ceil() as usize
            );
        }
    }
}

#[test]
fn twiss_tracker_matches_the_envelope() {
    let species = Species::proton(2.5e6);
    let t = Twiss::new(0.0, 1.0, 1.0e-6);
    let quad = Quadrupole::new("Q1", 0.1, 8.0).unwrap();
    let drift = Drift::new("D1", 0.4).unwrap();
    let mut envelope = Probe::from(
        EnvelopeProbe::new(species.clone(), beam())
            .with_current(0.02, 402.5e6)
            .unwrap(),
    );
    let mut twiss = Probe::from(
        TwissProbe::new(species, [t; 3])
            .unwrap()
            .with_current(0.02, 402.5e6)
            .unwrap(),
    );
    let lattice: [&dyn Element; 2] = [&quad, &drift];
    run(&Tracker::Envelope(config(0.02, UpdatePolicy::Exit, true)), &mut envelope, &lattice);
    run(&Tracker::Twiss(config(0.02, UpdatePolicy::Exit, true)), &mut twiss, &lattice);

    let (Probe::Envelope(env), Probe::Twiss(tw)) = (&envelope, &twiss) else {
        panic!("unexpected probe variants");
    };
    let expected = env.covariance.twiss().unwrap();
    for (plane, (got, want)) in tw.twiss.iter().zip(expected.iter()).enumerate() {
        assert!((got.beta - want.beta).abs() < 1e-9 * want.beta, "plane {plane}");
        assert!((got.alpha - want.alpha).abs() < 1e-9 * (1.0 + want.alpha.abs()), "plane {plane}");
        assert!((got.emittance - want.emittance).abs() < 1e-9 * want.emittance, "plane {plane}");
    }
    assert!(tw.betatron_phase[0] > 0.0);
}

#[test]
fn rf_gap_grows_the_envelope_only_when_enabled() {
    let species = Species::proton(2.5e6);
    let gap = RfGap::new("G1", 2.0e5, -0.5, 402.5e6).unwrap();
    let grown_config = TrackerConfig {
        emittance_growth: true,
        ..config(0.05, UpdatePolicy::Exit, false)
    };
    let mut grown = Probe::from(EnvelopeProbe::new(species.clone(), beam()));
    let mut plain = Probe::from(EnvelopeProbe::new(species, beam()));
    run(&Tracker::Envelope(grown_config), &mut grown, &[&gap]);
    run(&Tracker::Envelope(config(0.05, UpdatePolicy::Exit, false)), &mut plain, &[&gap]);

    let moments = |probe: &Probe| match probe {
        Probe::Envelope(env) => [
            env.covariance.central_moment(PhaseIndex::X, PhaseIndex::X),
            env.covariance.central_moment(PhaseIndex::XP, PhaseIndex::XP),
        ],
        other => panic!("unexpected probe {:?}", other.kind()),
    };
    let [grown_xx, grown_xpxp] = moments(&grown);
    let [plain_xx, plain_xpxp] = moments(&plain);
    assert!((grown_xx - plain_xx).abs() < 1e-18);
    assert!(grown_xpxp > plain_xpxp);
}

#[test]
fn drift_advances_twiss_phase() {
    let species = Species::proton(2.5e6);
    let t = Twiss::new(0.0, 1.0, 1.0e-6);
    let mut probe = Probe::from(TwissProbe::new(species, [t; 3]).unwrap());
    let drift = Drift::new("D1", 1.0).unwrap();
    let trajectory = run(
        &Tracker::Twiss(config(0.1, UpdatePolicy::Exit, false)),
        &mut probe,
        &[&drift],
    );
    let Probe::Twiss(tw) = &probe else {
        panic!("expected a Twiss probe");
    };
    assert!((tw.twiss[0].beta - 2.0).abs() < 1e-12);
    assert!((tw.twiss[0].alpha + 1.0).abs() < 1e-12);
    assert!((tw.betatron_phase[0] - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
    let response = *trajectory.final_state().unwrap().response().unwrap();
    assert!((response.elem(0, 1) - 1.0).abs() < 1e-12);
}
