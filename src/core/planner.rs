//! SW-016: Change plan — diff a fresh template against the last lock.

use super::emitter::Template;
use super::state;
use super::types::*;

/// Compare `template` with `lock`. Resources keep template order; resources
/// only present in the lock follow as destroys, in lock order. A lock written
/// for another stack is rejected.
pub fn plan(name: &str, template: &Template, lock: Option<&StackLock>) -> Result<ChangePlan, String> {
    if let Some(lock) = lock {
        if lock.stack != name {
            return Err(format!(
                "lock file belongs to stack '{}', not '{}'",
                lock.stack, name
            ));
        }
    }

    let mut changes = Vec::new();
    let mut to_create = 0u32;
    let mut to_update = 0u32;
    let mut to_destroy = 0u32;
    let mut unchanged = 0u32;

    for (id, resource) in &template.resources {
        let hash = state::resource_hash(resource)?;
        let action = match lock.and_then(|l| l.resources.get(id)) {
            None => PlanAction::Create,
            Some(previous) if previous.hash == hash => PlanAction::NoOp,
            Some(_) => PlanAction::Update,
        };
        match action {
            PlanAction::Create => to_create += 1,
            PlanAction::Update => to_update += 1,
            PlanAction::NoOp => unchanged += 1,
            PlanAction::Destroy => to_destroy += 1,
        }
        changes.push(PlannedChange {
            resource_id: id.clone(),
            resource_type: resource.resource_type.clone(),
            action,
            description: describe_action(id, &resource.resource_type, action),
        });
    }

    if let Some(lock) = lock {
        for (id, previous) in &lock.resources {
            if template.resources.contains_key(id) {
                continue;
            }
            to_destroy += 1;
            changes.push(PlannedChange {
                resource_id: id.clone(),
                resource_type: previous.resource_type.clone(),
                action: PlanAction::Destroy,
                description: describe_action(id, &previous.resource_type, PlanAction::Destroy),
            });
        }
    }

    Ok(ChangePlan {
        name: name.to_string(),
        changes,
        to_create,
        to_update,
        to_destroy,
        unchanged,
    })
}

fn describe_action(id: &str, resource_type: &str, action: PlanAction) -> String {
    match action {
        PlanAction::Create => format!("{}: create {}", id, resource_type),
        PlanAction::Update => format!("{}: update {}", id, resource_type),
        PlanAction::Destroy => format!("{}: destroy {}", id, resource_type),
        PlanAction::NoOp => format!("{}: {} (no changes)", id, resource_type),
    }
}
