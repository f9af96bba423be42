//! Operator-facing progress lines.
//!
//! Logs go to stderr through `tracing`; these are the two lines the person
//! running the tool actually waits for, printed to stdout.

/// Receives the milestones of a run.
pub trait Notifier: Sync {
    /// The single-use invite exists and the run now waits for the owner.
    fn invite_created(&self, invite_url: &str);

    /// The owner joined and holds the admin role.
    fn owner_granted(&self, guild_id: &str, user_id: &str);
}

/// Prints milestones to stdout with a green check mark.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

const CHECK: &str = "\u{1b}[32m✓\u{1b}[0m";

impl Notifier for ConsoleNotifier {
    fn invite_created(&self, invite_url: &str) {
        println!(
            "{} Invite created: {} - Now waiting for the owner to join...",
            CHECK, invite_url
        );
    }

    fn owner_granted(&self, _guild_id: &str, _user_id: &str) {
        println!("{} Owner was granted admin role", CHECK);
    }
}
