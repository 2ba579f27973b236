use chrono::{DateTime, Duration, Utc};

use crate::entities::{Priority, TaskDraft, TaskType};

/// One entry of the built-in checklist seeded onto every new event.
pub struct TaskTemplate {
    pub task_type: TaskType,
    pub title: &'static str,
    pub description: &'static str,
    pub days_before_event: i64,
    pub priority: Priority,
}

/// The default checklist, in insertion order. Offsets are whole days before
/// the event date.
pub const DEFAULT_TASK_TEMPLATES: [TaskTemplate; 10] = [
    TaskTemplate {
        task_type: TaskType::Proposal,
        title: "Write event proposal",
        description: "Draft the detailed proposal document for the event",
        days_before_event: 30,
        priority: Priority::High,
    },
    TaskTemplate {
        task_type: TaskType::Flyer,
        title: "Create flyer",
        description: "Design and produce the promotional flyer",
        days_before_event: 30,
        priority: Priority::High,
    },
    TaskTemplate {
        task_type: TaskType::Community,
        title: "Post to community app",
        description: "Publish the event announcement on the community app",
        days_before_event: 30,
        priority: Priority::Medium,
    },
    TaskTemplate {
        task_type: TaskType::Instagram,
        title: "Post to Instagram",
        description: "Publish the event announcement on Instagram",
        days_before_event: 30,
        priority: Priority::Medium,
    },
    TaskTemplate {
        task_type: TaskType::Line,
        title: "Open LINE reservations",
        description: "Start taking reservations on the official LINE account",
        days_before_event: 30,
        priority: Priority::Medium,
    },
    TaskTemplate {
        task_type: TaskType::Print,
        title: "Print and display flyer",
        description: "Print the flyer and put it up in the store",
        days_before_event: 30,
        priority: Priority::Medium,
    },
    TaskTemplate {
        task_type: TaskType::Meetup,
        title: "Post to Meetup",
        description: "Publish the event listing on Meetup",
        days_before_event: 7,
        priority: Priority::Medium,
    },
    TaskTemplate {
        task_type: TaskType::Story,
        title: "Post story",
        description: "Announce the event in a social media story",
        days_before_event: 7,
        priority: Priority::Low,
    },
    TaskTemplate {
        task_type: TaskType::StoryRepost,
        title: "Repost story",
        description: "Announce the event again in a story the day before",
        days_before_event: 1,
        priority: Priority::Low,
    },
    TaskTemplate {
        task_type: TaskType::Execution,
        title: "Run event and debrief",
        description: "Hold the event and the retrospective afterwards",
        days_before_event: 0,
        priority: Priority::High,
    },
];

/// Expands the template table into concrete drafts for an event scheduled at
/// `event_date`. Pure and total: due dates keep the event's time-of-day, the
/// offset is whole-day subtraction. Output order is template-table order.
pub fn generate_default_tasks(event_date: DateTime<Utc>) -> Vec<TaskDraft> {
    DEFAULT_TASK_TEMPLATES
        .iter()
        .map(|template| TaskDraft {
            title: template.title.to_string(),
            description: template.description.to_string(),
            due_date: event_date - Duration::days(template.days_before_event),
            task_type: template.task_type,
            priority: template.priority,
        })
        .collect()
}
