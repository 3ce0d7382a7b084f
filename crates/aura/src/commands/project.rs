//! Project commands: creation and access control.

use anyhow::{bail, Result};
use aura_core::auth::{authorize, Action, Role};
use aura_core::db::{AccessLevel, NewProject};
use aura_sdk::utils::format_timestamp;
use colored::Colorize;

use super::{print_json, Globals};
use crate::cli::{ProjectAction, ProjectCommand, RoleArg};

pub async fn execute(cmd: ProjectCommand, g: &Globals<'_>) -> Result<()> {
    match cmd.action {
        ProjectAction::Create {
            title,
            client,
            description,
            public,
        } => create(title, client, description, public, g),

        ProjectAction::Grant {
            project,
            grantee,
            role,
            permissions,
        } => grant(&project, &grantee, role, &permissions, g).await,

        ProjectAction::Access { project } => access(&project, g).await,
    }
}

fn create(
    title: String,
    client: Option<String>,
    description: Option<String>,
    public: bool,
    g: &Globals<'_>,
) -> Result<()> {
    let db = g.database()?;
    let id = db.create_project(&NewProject {
        owner_id: g.user.to_string(),
        title: Some(title.clone()),
        client,
        description,
        access_level: if public { AccessLevel::Public } else { AccessLevel::Private },
    })?;

    if g.json {
        return print_json(&serde_json::json!({ "id": id }));
    }
    println!("{} Project created", "✓".green());
    println!("  Title: {}", title.bold());
    println!("  Owner: {}", g.user);
    println!("  ID: {}", id);
    Ok(())
}

async fn grant(project: &str, grantee: &str, role: RoleArg, permissions: &[String], g: &Globals<'_>) -> Result<()> {
    let db = g.database()?;
    authorize(db.as_ref(), project, g.user, Action::ManageAccess).await?;

    let role = to_role(role);
    let permissions = parse_permissions(permissions)?;
    db.grant_access(project, grantee, role, permissions, Some(g.user))?;

    if g.json {
        return print_json(&serde_json::json!({ "project_id": project, "user_id": grantee, "role": role.as_str() }));
    }
    println!("{} Granted {} on {} to {}", "✓".green(), role.as_str().cyan(), project, grantee.bold());
    Ok(())
}

async fn access(project: &str, g: &Globals<'_>) -> Result<()> {
    let db = g.database()?;
    authorize(db.as_ref(), project, g.user, Action::Read).await?;

    let grants = db.list_access(project)?;
    if g.json {
        return print_json(&grants);
    }
    if grants.is_empty() {
        println!("{}", "No access grants.".dimmed());
        return Ok(());
    }
    for grant in grants {
        let permissions: Vec<&str> = grant.permissions.iter().map(|a| a.as_str()).collect();
        println!(
            "  {} {} [{}] {}",
            grant.user_id.bold(),
            grant.role.as_str().cyan(),
            permissions.join(", "),
            format_timestamp(grant.granted_at).dimmed()
        );
    }
    Ok(())
}

fn to_role(role: RoleArg) -> Role {
    match role {
        RoleArg::Owner => Role::Owner,
        RoleArg::Editor => Role::Editor,
        RoleArg::Viewer => Role::Viewer,
    }
}

/// Explicit permission names, or `None` for the role defaults
fn parse_permissions(names: &[String]) -> Result<Option<Vec<Action>>> {
    if names.is_empty() {
        return Ok(None);
    }
    let mut actions = Vec::with_capacity(names.len());
    for name in names {
        match Action::from_str(name) {
            Some(action) => actions.push(action),
            None => bail!("Unknown permission: {}", name),
        }
    }
    Ok(Some(actions))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_permissions() {
        assert_eq!(parse_permissions(&[]).unwrap(), None);
        assert_eq!(
            parse_permissions(&["read".into(), "manage_access".into()]).unwrap(),
            Some(vec![Action::Read, Action::ManageAccess])
        );
        assert!(parse_permissions(&["fly".into()]).is_err());
    }
}
