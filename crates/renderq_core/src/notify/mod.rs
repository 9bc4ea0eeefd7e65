//! Completion notifications.
//!
//! The queue builds notice text and decides whether email applies; the
//! actual delivery goes through a [`Notifier`].

mod notice;
mod settings;

use std::sync::Arc;

use thiserror::Error;

pub use notice::{email_message, local_notice, EmailMessage, Notice};
pub use settings::EmailSettings;

use crate::jobs::{Job, RenderOutcome};

/// Errors from notification delivery.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Email not configured")]
    NotConfigured,

    #[error("Email delivery is not supported by {0}")]
    Unsupported(String),

    #[error("Failed to send email: {0}")]
    Transport(String),
}

/// Result type for notification delivery.
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Delivery capability for notices.
pub trait Notifier: Send + Sync {
    /// Show a local notice. Best effort.
    fn notify_local(&self, title: &str, body: &str);

    /// Send an email to `to`.
    fn notify_remote(&self, to: &str, subject: &str, body: &str) -> NotifyResult<()>;
}

/// Notifier that only writes to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_local(&self, title: &str, body: &str) {
        tracing::info!(title, "{}", body);
    }

    fn notify_remote(&self, _to: &str, _subject: &str, _body: &str) -> NotifyResult<()> {
        Err(NotifyError::Unsupported("the log notifier".to_string()))
    }
}

/// Turns job outcomes into notifier calls.
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    email: EmailSettings,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, email: EmailSettings) -> Self {
        Self { notifier, email }
    }

    pub fn email(&self) -> &EmailSettings {
        &self.email
    }

    /// Notify about a finished job. Delivery failures are logged, never returned.
    pub fn dispatch(&self, job: &Job, outcome: &RenderOutcome) {
        let notice = local_notice(job, outcome);
        self.notifier.notify_local(&notice.title, &notice.body);

        if !self.email.should_send() {
            return;
        }
        let Some(message) = email_message(job, outcome) else {
            return;
        };
        if let Err(e) = self
            .notifier
            .notify_remote(&self.email.to, &message.subject, &message.body)
        {
            tracing::warn!(job = %job.id, error = %e, "Email notification failed");
        }
    }

    /// Send a test email with the current settings.
    pub fn send_test_email(&self) -> NotifyResult<()> {
        if !self.email.is_configured() || self.email.to.trim().is_empty() {
            return Err(NotifyError::NotConfigured);
        }
        self.notifier.notify_remote(
            &self.email.to,
            "AE Render Queue - Test Email",
            "This is a test email from the render queue. Email notifications are working.",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobSpec;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        local: Mutex<Vec<String>>,
        remote: Mutex<Vec<(String, String)>>,
        fail_remote: bool,
    }

    impl Notifier for Recorder {
        fn notify_local(&self, title: &str, _body: &str) {
            self.local.lock().push(title.to_string());
        }

        fn notify_remote(&self, to: &str, subject: &str, _body: &str) -> NotifyResult<()> {
            if self.fail_remote {
                return Err(NotifyError::Transport("connection refused".into()));
            }
            self.remote.lock().push((to.to_string(), subject.to_string()));
            Ok(())
        }
    }

    fn email() -> EmailSettings {
        EmailSettings {
            enabled: true,
            smtp: "smtp.example.com".into(),
            from: "renders@example.com".into(),
            to: "ops@example.com".into(),
            ..Default::default()
        }
    }

    fn job() -> Job {
        Job::new(JobSpec::new("/projects/intro.aep"), None)
    }

    #[test]
    fn dispatch_sends_local_and_email() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = NotificationDispatcher::new(recorder.clone(), email());

        dispatcher.dispatch(&job(), &RenderOutcome::exit_failure(2, None));

        assert_eq!(*recorder.local.lock(), vec!["Render Failed".to_string()]);
        assert_eq!(
            *recorder.remote.lock(),
            vec![("ops@example.com".to_string(), "AE Render Failed".to_string())]
        );
    }

    #[test]
    fn disabled_email_is_local_only() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = NotificationDispatcher::new(recorder.clone(), EmailSettings::default());

        dispatcher.dispatch(&job(), &RenderOutcome::Cancelled);

        assert_eq!(recorder.local.lock().len(), 1);
        assert!(recorder.remote.lock().is_empty());
    }

    #[test]
    fn remote_failure_is_swallowed() {
        let recorder = Arc::new(Recorder {
            fail_remote: true,
            ..Default::default()
        });
        let dispatcher = NotificationDispatcher::new(recorder.clone(), email());

        dispatcher.dispatch(
            &job(),
            &RenderOutcome::Completed {
                duration_secs: 1,
                frames: 1,
            },
        );
        assert_eq!(recorder.local.lock().len(), 1);
    }

    #[test]
    fn test_email_requires_configuration() {
        let dispatcher =
            NotificationDispatcher::new(Arc::new(LogNotifier), EmailSettings::default());
        assert_eq!(dispatcher.send_test_email(), Err(NotifyError::NotConfigured));
        assert_eq!(
            NotifyError::NotConfigured.to_string(),
            "Email not configured"
        );

        let dispatcher = NotificationDispatcher::new(Arc::new(LogNotifier), email());
        assert!(matches!(
            dispatcher.send_test_email(),
            Err(NotifyError::Unsupported(_))
        ));
    }
}
