//! The ordered conversation state sent to the model every cycle.

use crate::types::{Role, Turn};

/// An append-only list of turns that always opens with the system turn.
///
/// Turns are never removed individually; [`Transcript::reset_to_initial`] is the only way to
/// shrink a transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    system_prompt: String,
    turns: Vec<Turn>,
}

impl Transcript {
    /// Creates a transcript holding only the system turn.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let system_prompt = system_prompt.into();
        let turns = vec![Turn::system(system_prompt.clone())];
        Self {
            system_prompt,
            turns,
        }
    }

    /// Adds a turn to the end.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Replaces the contents with exactly the initial system turn.
    pub fn reset_to_initial(&mut self) {
        self.turns.clear();
        self.turns.push(Turn::system(self.system_prompt.clone()));
    }

    /// Turns worth showing to a person, in order; system turns are left out.
    ///
    /// This is for display only.  Requests always carry [`Transcript::turns`].
    pub fn visible_history(&self) -> impl Iterator<Item = &Turn> + '_ {
        self.turns.iter().filter(|turn| turn.role() != Role::System)
    }

    /// Every turn, system turn first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The prompt the transcript resets to.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// The last turn, if it was spoken by `role`.
    pub fn last_if(&self, role: Role) -> Option<&Turn> {
        self.turns.last().filter(|turn| turn.role() == role)
    }

    /// The number of turns, including the system turn.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// True when nothing but the system turn is present.
    pub fn is_initial(&self) -> bool {
        self.turns.len() == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_system_turn() {
        let transcript = Transcript::new("Be helpful.");
        assert_eq!(transcript.turns(), &[Turn::system("Be helpful.")]);
        assert!(transcript.is_initial());
        assert_eq!(transcript.visible_history().count(), 0);
    }

    #[test]
    fn visible_history_excludes_system_turns_in_order() {
        let mut transcript = Transcript::new("sys");
        transcript.append(Turn::user("one"));
        transcript.append(Turn::assistant("two"));
        transcript.append(Turn::system("injected"));
        transcript.append(Turn::user("three"));
        transcript.append(Turn::user("four"));

        let visible: Vec<&str> = transcript.visible_history().map(Turn::content).collect();
        assert_eq!(visible, vec!["one", "two", "three", "four"]);
        assert_eq!(transcript.len(), 6);
    }

    #[test]
    fn reset_restores_exactly_the_system_turn() {
        let mut transcript = Transcript::new("sys");
        for i in 0..4 {
            transcript.append(Turn::user(format!("u{i}")));
        }
        assert_eq!(transcript.len(), 5);

        transcript.reset_to_initial();
        assert_eq!(transcript.turns(), &[Turn::system("sys")]);

        let once = transcript.clone();
        transcript.reset_to_initial();
        assert_eq!(transcript, once);
        assert_eq!(transcript.visible_history().count(), 0);
    }

    #[test]
    fn last_if_matches_role() {
        let mut transcript = Transcript::new("sys");
        transcript.append(Turn::user("hi"));
        assert_eq!(
            transcript.last_if(Role::User).map(Turn::content),
            Some("hi")
        );
        assert!(transcript.last_if(Role::Assistant).is_none());
    }
}
