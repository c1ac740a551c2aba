use crate::error::{AppError, AppResult};
use crate::models::*;

const MAX_CATEGORY_LEN: usize = 100;
const MIN_PASSWORD_LEN: usize = 6;
const MAX_COMMENT_LEN: usize = 5000;

pub fn validate_record_activity(request: &RecordActivityRequest) -> AppResult<()> {
    if request.resource_id.is_nil() {
        return Err(AppError::validation("Resource ID cannot be nil"));
    }

    validate_category(&request.resource_category)?;

    if !request.duration.is_finite() || request.duration < 0.0 {
        return Err(AppError::validation(
            "Duration must be a non-negative number of seconds",
        ));
    }

    Ok(())
}

pub fn validate_category(category: &str) -> AppResult<()> {
    if category.trim().is_empty() {
        return Err(AppError::validation("Resource category is required"));
    }

    if category.len() > MAX_CATEGORY_LEN {
        return Err(AppError::validation(format!(
            "Resource category too long (max {} characters)",
            MAX_CATEGORY_LEN
        )));
    }

    Ok(())
}

pub fn validate_registration(request: &RegisterRequest) -> AppResult<()> {
    if request.email.trim().is_empty() {
        return Err(AppError::validation("Email is required!"));
    }

    if !request.email.contains('@') {
        return Err(AppError::validation("Email address is malformed"));
    }

    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password of at least {} characters long is required!",
            MIN_PASSWORD_LEN
        )));
    }

    Ok(())
}

pub fn validate_group(request: &CreateGroupRequest) -> AppResult<()> {
    require_non_empty("Group name", &request.name)?;

    if request.members.iter().any(|id| id.is_nil()) {
        return Err(AppError::validation("Group member ID cannot be nil"));
    }

    Ok(())
}

pub fn validate_project(request: &CreateProjectRequest) -> AppResult<()> {
    require_non_empty("Project name", &request.name)
}

pub fn validate_resource(request: &CreateResourceRequest) -> AppResult<()> {
    require_non_empty("Resource title", &request.title)?;
    require_non_empty("Resource project path", &request.project_path)?;

    if request.project_id.is_nil() {
        return Err(AppError::validation("Project ID cannot be nil"));
    }

    if let Some(category) = &request.category {
        validate_category(category)?;
    }

    Ok(())
}

pub fn validate_group_update(request: &UpdateGroupRequest) -> AppResult<()> {
    if let Some(name) = &request.name {
        require_non_empty("Group name", name)?;
    }

    if let Some(member) = &request.new_member {
        require_non_empty("Group member email", &member.email)?;
    }

    Ok(())
}

pub fn validate_project_update(request: &UpdateProjectRequest) -> AppResult<()> {
    match &request.name {
        Some(name) => require_non_empty("Project name", name),
        None => Ok(()),
    }
}

pub fn validate_resource_update(request: &UpdateResourceRequest) -> AppResult<()> {
    if let Some(title) = &request.title {
        require_non_empty("Resource title", title)?;
    }

    if let Some(path) = &request.project_path {
        require_non_empty("Resource project path", path)?;
    }

    if let Some(category) = &request.category {
        validate_category(category)?;
    }

    Ok(())
}

pub fn validate_comment(message: &str) -> AppResult<()> {
    require_non_empty("Comment message", message)?;

    if message.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::validation(format!(
            "Comment too long (max {} characters)",
            MAX_COMMENT_LEN
        )));
    }

    Ok(())
}

fn require_non_empty(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{} is required", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn activity(category: &str, duration: f64) -> RecordActivityRequest {
        RecordActivityRequest {
            resource_id: Uuid::new_v4(),
            resource_category: category.to_string(),
            project_id: None,
            duration,
            is_favourite: false,
        }
    }

    #[test]
    fn test_validate_record_activity() {
        assert!(validate_record_activity(&activity("cs.AI", 12.0)).is_ok());
        assert!(validate_record_activity(&activity("   ", 12.0)).is_err());
        assert!(validate_record_activity(&activity("cs.AI", -1.0)).is_err());
        assert!(validate_record_activity(&activity("cs.AI", f64::NAN)).is_err());

        let mut nil_resource = activity("cs.AI", 1.0);
        nil_resource.resource_id = Uuid::nil();
        assert!(matches!(
            validate_record_activity(&nil_resource),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_registration() {
        let mut request = RegisterRequest {
            email: "ada@example.org".to_string(),
            password: "secret1".to_string(),
            first_name: None,
            last_name: None,
            research_interests: vec![],
        };
        assert!(validate_registration(&request).is_ok());

        request.password = "short".to_string();
        assert!(validate_registration(&request).is_err());

        request.password = "long-enough".to_string();
        request.email = String::new();
        assert!(validate_registration(&request).is_err());
    }

    #[test]
    fn test_validate_updates() {
        assert!(validate_group_update(&UpdateGroupRequest::default()).is_ok());
        assert!(validate_group_update(&UpdateGroupRequest {
            name: Some(" ".to_string()),
            ..Default::default()
        })
        .is_err());

        assert!(validate_resource_update(&UpdateResourceRequest {
            project_path: Some(String::new()),
            ..Default::default()
        })
        .is_err());

        assert!(validate_comment("Nice result").is_ok());
        assert!(validate_comment("").is_err());
        assert!(validate_comment(&"x".repeat(MAX_COMMENT_LEN + 1)).is_err());
    }
}
