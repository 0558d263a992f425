//! Error mode of whole runs: the driver always reports, the integral engine
//! follows the mode of its parameters, and concurrent runs stay independent.

mod common;

use coffe_rust::{Contributions, CorrelationArray, ErrorKind, ErrorMode, Parameters, compute_all};
use coffe_rust::IntegrationSettings;

fn density(z_mean: Vec<f64>) -> Parameters {
    common::parameters(
        z_mean,
        vec![0.0],
        vec![10.0],
        common::turnover_spectrum(),
        Contributions::density_only(),
    )
}

#[test]
fn driver_reports_in_abort_mode() {
    let bg = common::background(1.0);
    let integrals = compute_all(&density(vec![0.5]), &bg).unwrap();
    let outside = density(vec![0.5, 1.5]).with_error_mode(ErrorMode::Abort);

    let mut array = CorrelationArray::new();
    let result = array.compute(&outside, &bg, &integrals);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Domain);
    assert!(array.is_empty());
}

#[test]
fn integral_failure_panics_in_abort_mode() {
    let bg = common::background(1.0);
    let p = density(vec![0.5]);
    let integration = IntegrationSettings {
        max_levels: 1,
        ..p.integration().clone()
    };
    let p = p.with_integration(integration).unwrap();

    let reported = compute_all(&p, &bg).unwrap_err();
    assert_eq!(reported.kind(), ErrorKind::Convergence);

    let aborting = p.with_error_mode(ErrorMode::Abort);
    let outcome = std::panic::catch_unwind(|| compute_all(&aborting, &bg));
    assert!(outcome.is_err());
}

#[test]
fn concurrent_runs_keep_their_own_mode() {
    let bg = common::background(1.0);
    let integrals = compute_all(&density(vec![0.5]), &bg).unwrap();
    let outside = density(vec![0.5, 1.5]).with_error_mode(ErrorMode::Abort);
    let inside = density(vec![0.3, 0.5]).with_error_mode(ErrorMode::Abort);

    std::thread::scope(|scope| {
        let runs: Vec<_> = (0..4)
            .map(|i| {
                let (bg, integrals) = (&bg, &integrals);
                let p = if i % 2 == 0 { &outside } else { &inside };
                scope.spawn(move || {
                    let mut array = CorrelationArray::new();
                    (0..5)
                        .map(|_| array.compute(p, bg, integrals).map(|_| array.len()))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for (i, run) in runs.into_iter().enumerate() {
            let results = run.join().expect("a run panicked instead of reporting");
            for result in results {
                if i % 2 == 0 {
                    assert_eq!(result.unwrap_err().kind(), ErrorKind::Domain);
                } else {
                    assert_eq!(result.unwrap(), 2);
                }
            }
        }
    });
}
