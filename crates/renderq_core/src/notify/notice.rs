//! Notification text for finished jobs.

use crate::format::format_duration;
use crate::jobs::{Job, RenderOutcome};

/// A desktop-style notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub body: String,
}

/// An email ready to hand to a notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub body: String,
}

/// Local notice for a job that reached `outcome`.
pub fn local_notice(job: &Job, outcome: &RenderOutcome) -> Notice {
    let name = job.name();
    match outcome {
        RenderOutcome::Completed { duration_secs, .. } => Notice {
            title: "Render Complete".to_string(),
            body: format!("{} finished in {}", name, format_duration(*duration_secs)),
        },
        RenderOutcome::Failed { message, .. } => Notice {
            title: "Render Failed".to_string(),
            body: format!("{}: {}", name, message),
        },
        RenderOutcome::Cancelled => Notice {
            title: "Render Cancelled".to_string(),
            body: format!("{} was cancelled", name),
        },
    }
}

/// Email for `outcome`; cancellations are not emailed.
pub fn email_message(job: &Job, outcome: &RenderOutcome) -> Option<EmailMessage> {
    let name = job.name();
    match outcome {
        RenderOutcome::Completed { duration_secs, .. } => Some(EmailMessage {
            subject: "AE Render Complete".to_string(),
            body: format!(
                "Project: {}\nDuration: {}\nStatus: Success",
                name,
                format_duration(*duration_secs)
            ),
        }),
        RenderOutcome::Failed {
            exit_code,
            message,
            details,
        } => {
            let details = details
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .unwrap_or("See logs for details");
            let reason = match exit_code {
                Some(code) => format!("Error Code: {}", code),
                None => format!("Error: {}", message),
            };
            Some(EmailMessage {
                subject: "AE Render Failed".to_string(),
                body: format!("Project: {}\n{}\nDetails: {}", name, reason, details),
            })
        }
        RenderOutcome::Cancelled => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobSpec;

    fn job() -> Job {
        Job::new(JobSpec::new("/projects/intro.aep"), None)
    }

    #[test]
    fn completed_notice_and_email() {
        let outcome = RenderOutcome::Completed {
            duration_secs: 125,
            frames: 300,
        };
        let notice = local_notice(&job(), &outcome);
        assert_eq!(notice.title, "Render Complete");
        assert_eq!(notice.body, "intro.aep finished in 2m 5s");

        let email = email_message(&job(), &outcome).unwrap();
        assert_eq!(email.subject, "AE Render Complete");
        assert_eq!(email.body, "Project: intro.aep\nDuration: 2m 5s\nStatus: Success");
    }

    #[test]
    fn failure_email_falls_back_to_log_hint() {
        let outcome = RenderOutcome::exit_failure(1, None);
        let email = email_message(&job(), &outcome).unwrap();
        assert_eq!(
            email.body,
            "Project: intro.aep\nError Code: 1\nDetails: See logs for details"
        );
        assert_eq!(
            local_notice(&job(), &outcome).body,
            "intro.aep: Render failed with code 1"
        );
    }

    #[test]
    fn start_failure_email_names_the_error() {
        let outcome = RenderOutcome::start_failure("Project file not found");
        let email = email_message(&job(), &outcome).unwrap();
        assert!(email.body.contains("Error: Project file not found"));
    }

    #[test]
    fn cancelled_is_local_only() {
        assert_eq!(local_notice(&job(), &RenderOutcome::Cancelled).title, "Render Cancelled");
        assert!(email_message(&job(), &RenderOutcome::Cancelled).is_none());
    }
}
