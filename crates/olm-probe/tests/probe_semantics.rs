use olm_core::{
    CovarianceMatrix, OlmError, PhaseIndex, PhaseMap, PhaseMatrix, PhaseVector, Species, Twiss,
};
use olm_probe::{
    DiagnosticProbe, EnsembleProbe, EnvelopeProbe, Kick, MacroParticle, ParticleProbe, Probe,
    ProbeKind, StateData, TransferMapProbe, TwissProbe,
};

fn drift(l: f64) -> PhaseMap {
    let b = [[1.0, l], [0.0, 1.0]];
    PhaseMap::linear(PhaseMatrix::from_blocks(b, b, b))
}

fn sample_envelope() -> EnvelopeProbe {
    let tx = Twiss::new(-1.2, 3.5, 2e-6);
    let ty = Twiss::new(0.8, 1.5, 3e-6);
    let tz = Twiss::new(0.0, 10.0, 1e-5);
    let cov = CovarianceMatrix::from_twiss(&tx, &ty, &tz).unwrap();
    EnvelopeProbe::new(Species::proton(2.5e6), cov)
}

#[test]
fn particle_advance_accumulates_response() {
    let mut probe: Probe = ParticleProbe::new(
        Species::proton(1e9),
        PhaseVector::new(0.0, 1e-3, 0.0, 0.0, 0.0, 0.0),
    )
    .into();
    probe.advance(&drift(0.5)).unwrap();
    probe.advance(&drift(0.5)).unwrap();
    let state = probe.create_state().unwrap();
    let StateData::Particle { state, response } = state.data else {
        panic!("particle state expected");
    };
    assert!((state.get(PhaseIndex::X) - 1e-3).abs() < 1e-15);
    assert!((response.get(PhaseIndex::X, PhaseIndex::XP) - 1.0).abs() < 1e-15);
}

#[test]
fn copies_are_isolated() {
    let original: Probe = sample_envelope().into();
    let mut copy = original.clone();
    copy.advance(&drift(2.0)).unwrap();
    copy.core_mut().position = 2.0;
    assert_ne!(copy, original);
    let Probe::Envelope(env) = &original else {
        panic!("envelope expected");
    };
    assert_eq!(env.covariance, sample_envelope().covariance);
    assert_eq!(original.position(), 0.0);
}

#[test]
fn reset_restores_seeded_state() {
    let mut probe: Probe = DiagnosticProbe::new(Species::proton(1e6)).into();
    probe.initialize().unwrap();
    probe.update();
    probe.update();
    probe.core_mut().advance(1.0, 1e-6, 0.0);
    probe.reset();
    let Probe::Diagnostic(diag) = &probe else {
        panic!("diagnostic expected");
    };
    assert_eq!(diag.visited, 0);
    assert_eq!(probe.position(), 0.0);
    assert!(probe.is_initialized());
}

#[test]
fn ensemble_kick_on_envelope_is_incompatible() {
    let mut probe: Probe = sample_envelope().into();
    let err = probe.apply_kick(&Kick::Impulses(vec![[0.0; 3]])).unwrap_err();
    assert!(matches!(err, OlmError::IncompatibleProbe(_)));

    let mut probe: Probe = TransferMapProbe::new(Species::proton(1e6)).into();
    let err = probe
        .apply_kick(&Kick::SpaceCharge(PhaseMatrix::identity()))
        .unwrap_err();
    assert!(matches!(err, OlmError::IncompatibleProbe(_)));
}

#[test]
fn impulses_move_ensemble_divergences() {
    let particles = vec![
        MacroParticle::new(1e-15, PhaseVector::new(1e-3, 0.0, 0.0, 0.0, 0.0, 0.0)),
        MacroParticle::new(1e-15, PhaseVector::new(-2e-3, 0.0, 0.0, 0.0, 0.0, 0.0)),
    ];
    let mut probe: Probe = EnsembleProbe::new(Species::proton(1e6), particles)
        .unwrap()
        .into();
    probe
        .apply_kick(&Kick::Impulses(vec![[1e-4, 0.0, 0.0], [-1e-4, 0.0, 2e-5]]))
        .unwrap();
    let Probe::Ensemble(ens) = &probe else {
        panic!("ensemble expected");
    };
    assert!((ens.particles()[0].coords.get(PhaseIndex::XP) - 1e-4).abs() < 1e-18);
    assert!((ens.particles()[1].coords.get(PhaseIndex::ZP) - 2e-5).abs() < 1e-18);
    assert_eq!(probe.kind(), ProbeKind::Ensemble);
}

#[test]
fn ensemble_order_is_restored_after_update() {
    let particles = vec![
        MacroParticle::new(1e-15, PhaseVector::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0)),
        MacroParticle::new(1e-15, PhaseVector::new(0.0, 0.0, 2.0, 0.0, 0.0, 0.0)),
    ];
    let mut probe: Probe = EnsembleProbe::new(Species::proton(1e6), particles)
        .unwrap()
        .into();
    let mut stretch = PhaseMatrix::identity();
    stretch.set(PhaseIndex::X, PhaseIndex::X, 3.0);
    probe.advance(&PhaseMap::linear(stretch)).unwrap();
    probe.update();
    let Probe::Ensemble(ens) = &probe else {
        panic!("ensemble expected");
    };
    let norms: Vec<f64> = ens.particles().iter().map(|p| p.coords.norm2()).collect();
    assert_eq!(norms, vec![2.0, 3.0]);
}

#[test]
fn envelope_perveance_scales_with_current() {
    let zero = sample_envelope();
    assert_eq!(zero.perveance(), 0.0);
    let one = sample_envelope().with_current(0.01, 402.5e6).unwrap();
    let two = sample_envelope().with_current(0.02, 402.5e6).unwrap();
    assert!(one.perveance() > 0.0);
    assert!((two.perveance() / one.perveance() - 2.0).abs() < 1e-12);
    assert!(sample_envelope().with_current(-1.0, 1.0).is_err());
}

#[test]
fn envelope_drift_keeps_emittance() {
    let mut probe: Probe = sample_envelope().into();
    probe.initialize().unwrap();
    probe.advance(&drift(3.0)).unwrap();
    probe.update();
    let Probe::Envelope(env) = &probe else {
        panic!("envelope expected");
    };
    let twiss = env.twiss().unwrap();
    assert!((twiss[0].emittance - 2e-6).abs() < 1e-15);
    // beta grows as β − 2αs + γs² through a drift.
    let tx = Twiss::new(-1.2, 3.5, 2e-6);
    let expected = tx.beta - 2.0 * tx.alpha * 3.0 + tx.gamma() * 9.0;
    assert!((twiss[0].beta - expected).abs() < 1e-9);
}

#[test]
fn twiss_state_tracks_the_centroid_and_rejects_impulses() {
    let planes = [
        Twiss::new(-1.2, 3.5, 2e-6),
        Twiss::new(0.8, 1.5, 3e-6),
        Twiss::new(0.0, 10.0, 1e-5),
    ];
    let centroid = PhaseVector::new(1e-3, 0.0, 0.0, 2e-4, 0.0, 0.0);
    let mut probe = Probe::from(
        TwissProbe::new(Species::proton(2.5e6), planes)
            .unwrap()
            .with_centroid(centroid),
    );
    assert_eq!(probe.kind(), ProbeKind::Twiss);
    probe.advance(&drift(0.5)).unwrap();

    let state = probe.create_state().unwrap();
    let moved = state.centroid().unwrap();
    assert!((moved.get(PhaseIndex::X) - 1e-3).abs() < 1e-15);
    assert!((moved.get(PhaseIndex::Y) - 1e-4).abs() < 1e-15);
    let StateData::Twiss { twiss, .. } = state.data else {
        panic!("expected Twiss data");
    };
    assert!((twiss[0].emittance - 2e-6).abs() < 1e-18);

    let err = probe.apply_kick(&Kick::Impulses(vec![])).unwrap_err();
    assert!(matches!(err, OlmError::IncompatibleProbe(_)));
}

#[test]
fn invalid_twiss_planes_are_rejected() {
    let bad = [Twiss::new(0.0, -1.0, 1e-6); 3];
    let err = TwissProbe::new(Species::proton(2.5e6), bad).unwrap_err();
    assert_eq!(err.info().code, "twiss-invalid");
}

#[test]
fn transfer_map_response_is_ordered_product() {
    let lens = {
        let b = [[1.0, 0.0], [-2.0, 1.0]];
        PhaseMap::linear(PhaseMatrix::from_blocks(b, b, b))
    };
    let mut probe = Probe::from(TransferMapProbe::new(Species::proton(1e6)));
    probe.advance(&drift(0.5)).unwrap();
    probe.advance(&lens).unwrap();
    let expected = lens.linear_part().times(drift(0.5).linear_part()).unwrap();
    let response = *probe.create_state().unwrap().response().unwrap();
    assert!(response.max_abs_diff(&expected) < 1e-15);
    assert_eq!(response.elem(1, 1), 0.0);
}
