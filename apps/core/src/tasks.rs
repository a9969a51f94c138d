#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Continue,
    Done,
}

pub trait Task {
    /// Does one bounded slice of work. Must not block.
    fn step(&mut self) -> TaskStatus;
}

impl<F> Task for F
where
    F: FnMut() -> TaskStatus,
{
    fn step(&mut self) -> TaskStatus {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

#[derive(Default)]
pub struct TaskRegistry {
    next_id: u64,
    tasks: Vec<(TaskId, Box<dyn Task>)>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, task: Box<dyn Task>) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.tasks.push((id, task));
        id
    }

    pub fn unregister(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|(task_id, _)| *task_id != id);
        self.tasks.len() != before
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.iter().any(|(task_id, _)| *task_id == id)
    }

    pub fn tick(&mut self) {
        self.tasks
            .retain_mut(|(_, task)| task.step() == TaskStatus::Continue);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("ids", &self.tasks.iter().map(|(id, _)| id).collect::<Vec<_>>())
            .finish()
    }
}
