use super::{properties_element, required_id, string_properties, BuildContext, EntityBuilder};
use crate::bundle::{EntityKind, ScheduledTask};
use crate::consistency_error;
use crate::core::error::BundleResult;
use crate::document::Entity;
use crate::xml::Element;

pub const JOB_TYPE_RECURRING: &str = "Recurring";
pub const JOB_TYPE_ONE_TIME: &str = "One time";

#[derive(Debug, Default)]
pub struct ScheduledTaskEntityBuilder;

impl EntityBuilder for ScheduledTaskEntityBuilder {
    fn name(&self) -> &str {
        "scheduled-task"
    }

    fn order(&self) -> i32 {
        1000
    }

    fn build(&self, context: &BuildContext<'_>) -> BundleResult<Vec<Entity>> {
        context
            .bundle
            .scheduled_tasks
            .iter()
            .map(|(name, task)| build_task(context, name, task))
            .collect()
    }
}

/// Quartz style cron expression: six or seven space separated fields
fn validate_cron(name: &str, expression: &str) -> BundleResult<()> {
    let fields = expression.split_whitespace().count();
    if (6..=7).contains(&fields) {
        Ok(())
    } else {
        Err(consistency_error!(
            "Scheduled task '{}' has cron expression '{}' with {} fields, expected 6 or 7",
            name,
            expression,
            fields
        ))
    }
}

fn build_task(context: &BuildContext<'_>, name: &str, task: &ScheduledTask) -> BundleResult<Entity> {
    let id = required_id(&task.id, EntityKind::ScheduledTask, name)?;
    let referrer = format!("scheduled task '{}'", name);
    let policy = context.bundle.resolve_policy(&task.policy, &referrer)?.entity();
    let policy_id = required_id(&policy.id, EntityKind::Policy, &task.policy)?;

    let schedule = match task.job_type.as_str() {
        JOB_TYPE_RECURRING => {
            let cron = task.cron_expression.as_deref().ok_or_else(|| {
                consistency_error!("Recurring scheduled task '{}' has no cronExpression", name)
            })?;
            validate_cron(name, cron)?;
            Element::text_element("l7:CronExpression", cron)
        }
        JOB_TYPE_ONE_TIME => {
            let date = task.execution_date.as_deref().ok_or_else(|| {
                consistency_error!("One time scheduled task '{}' has no executionDate", name)
            })?;
            Element::text_element("l7:ExecutionDate", date)
        }
        other => {
            return Err(consistency_error!(
                "Scheduled task '{}' has unknown job type '{}'",
                name,
                other
            ))
        }
    };

    let payload = Element::new("l7:ScheduledTask")
        .with_attr("id", id)
        .with_child(Element::text_element("l7:Name", name))
        .with_child(Element::new("l7:PolicyReference").with_attr("id", policy_id))
        .with_child(Element::text_element("l7:OneNode", task.one_node.to_string()))
        .with_child(Element::text_element("l7:JobType", task.job_type.as_str()))
        .with_child(schedule)
        .with_child(Element::text_element("l7:JobStatus", task.job_status.as_str()))
        .with_child(Element::text_element(
            "l7:ExecuteOnCreate",
            task.execute_on_create.to_string(),
        ))
        .with_optional_child(properties_element(string_properties(&task.properties, "")));
    Ok(Entity::new(EntityKind::ScheduledTask, name, id, payload))
}
