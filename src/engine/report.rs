use crate::engine::fetcher::FetchOutcome;
use crate::engine::resolver::ReadinessReport;
use crate::engine::runner::BuildOutcome;

/// Everything a run observed. Steps that were not executed stay empty.
#[derive(Debug, Default)]
pub struct RunReport {
    pub fetches: Vec<(String, FetchOutcome)>,
    pub readiness: Option<ReadinessReport>,
    pub toolchain_installed: Option<bool>,
    pub builds: Vec<(String, BuildOutcome)>,
}

impl RunReport {
    pub fn failed_fetches(&self) -> usize {
        self.fetches.iter().filter(|(_, x)| x.is_failed()).count()
    }

    pub fn failed_builds(&self) -> usize {
        self.builds.iter().filter(|(_, x)| !x.is_success()).count()
    }

    /// True when every executed step reached its good outcome.
    pub fn succeeded(&self) -> bool {
        self.failed_fetches() == 0
            && self.readiness.as_ref().map_or(true, ReadinessReport::ready)
            && self.toolchain_installed.unwrap_or(true)
            && self.failed_builds() == 0
    }

    /// Process exit status: 0 on full success, 1 when any step failed.
    /// `report_only` always answers 0.
    pub fn exit_status(&self, report_only: bool) -> u8 {
        if report_only || self.succeeded() {
            0
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fetcher::FetchFailure;

    fn all_good() -> RunReport {
        RunReport {
            fetches: vec![
                ("a.h".to_string(), FetchOutcome::Downloaded),
                ("b.h".to_string(), FetchOutcome::AlreadyPresent),
            ],
            readiness: Some(ReadinessReport::default()),
            toolchain_installed: Some(true),
            builds: vec![("cli".to_string(), BuildOutcome::Success)],
        }
    }

    #[test]
    fn full_success_exits_zero() {
        let report = all_good();
        assert!(report.succeeded());
        assert_eq!(report.exit_status(false), 0);
    }

    #[test]
    fn any_failed_step_exits_one() {
        let mut report = all_good();
        report.fetches.push((
            "c.h".to_string(),
            FetchOutcome::Failed(FetchFailure::Status { status: 404 }),
        ));
        assert_eq!(report.failed_fetches(), 1);
        assert_eq!(report.exit_status(false), 1);

        let mut report = all_good();
        report.readiness = Some(ReadinessReport {
            missing: vec!["a.h".to_string()],
        });
        assert_eq!(report.exit_status(false), 1);

        let mut report = all_good();
        report.toolchain_installed = Some(false);
        assert_eq!(report.exit_status(false), 1);

        let mut report = all_good();
        report.builds.push((
            "gui".to_string(),
            BuildOutcome::Failure {
                exit_code: Some(1),
                stderr: "error".to_string(),
            },
        ));
        assert_eq!(report.failed_builds(), 1);
        assert_eq!(report.exit_status(false), 1);
        assert_eq!(report.exit_status(true), 0);
    }

    #[test]
    fn skipped_steps_do_not_count_as_failures() {
        let report = RunReport {
            toolchain_installed: Some(true),
            ..Default::default()
        };
        assert!(report.succeeded());
    }
}
