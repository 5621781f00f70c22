use crate::queue::QueueDiscipline;
use crate::simulation::Simulation;
use crate::time::SimTime;

/// Builder for a discrete-event simulation.
///
/// The queue discipline and the starting time are fixed when
/// [`init()`](SimInit::init) is called and cannot be changed afterwards.
#[derive(Debug, Default)]
pub struct SimInit {
    discipline: QueueDiscipline,
    start: SimTime,
}

impl SimInit {
    /// Creates a builder with the default queue discipline
    /// ([`QueueDiscipline::Map`]) and a start time of [`SimTime::ZERO`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the queue discipline backing the simulation.
    pub fn set_queue(mut self, discipline: QueueDiscipline) -> Self {
        self.discipline = discipline;

        self
    }

    /// Sets the starting simulation time.
    pub fn set_start(mut self, start: SimTime) -> Self {
        self.start = start;

        self
    }

    /// Builds the simulation.
    pub fn init(self) -> Simulation {
        Simulation::new(self.discipline, self.start)
    }
}
