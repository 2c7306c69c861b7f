use super::crew::Crew;
use super::{Team, Work};
use crate::error::TeamError;

/// Team of exactly one dedicated thread.
///
/// Work runs strictly in submission order. Suited to functions that must run
/// in isolation, such as a blocking accept loop.
pub struct OnePersonTeam {
    crew: Crew,
}

impl OnePersonTeam {
    pub fn new(name: impl Into<String>) -> std::io::Result<Self> {
        Ok(Self {
            crew: Crew::spawn(name, 1)?,
        })
    }
}

impl Team for OnePersonTeam {
    fn name(&self) -> &str {
        self.crew.name()
    }

    fn assign(&self, work: Work) -> Result<(), TeamError> {
        self.crew.assign(work)
    }

    fn shutdown(&self) {
        self.crew.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn runs_in_submission_order_on_one_thread() {
        let team = OnePersonTeam::new("solo").unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..20 {
            let log = log.clone();
            team.assign(Box::new(move || {
                let name = std::thread::current().name().map(str::to_string);
                log.lock().unwrap().push((i, name));
            }))
            .unwrap();
        }
        team.shutdown();

        let log = log.lock().unwrap();
        let order: Vec<i32> = log.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, (0..20).collect::<Vec<_>>());
        assert!(log.iter().all(|(_, n)| n.as_deref() == Some("solo-0")));
    }
}
