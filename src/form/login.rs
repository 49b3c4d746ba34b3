use super::validation::{email, password, FormErrors};
use crate::api::LoginCredentials;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
  pub email: String,
  pub password: String,
}

impl LoginForm {
  pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
    Self {
      email: email.into(),
      password: password.into(),
    }
  }

  pub fn validate(&self) -> Result<LoginCredentials, FormErrors> {
    let mut errors = FormErrors::default();
    errors.check("email", email(&self.email));
    errors.check("password", password(&self.password));
    errors.into_result()?;

    Ok(LoginCredentials {
      email: self.email.trim().to_string(),
      password: self.password.clone(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::form::ValidationError;

  #[test]
  fn test_valid_login() {
    let creds = LoginForm::new(" ayu@example.com ", "rahasia").validate().unwrap();
    assert_eq!(creds.email, "ayu@example.com");
    assert_eq!(creds.password, "rahasia");
  }

  #[test]
  fn test_invalid_login_reports_each_field() {
    let errors = LoginForm::new("ayu", "123").validate().unwrap_err();
    assert_eq!(errors.get("email"), Some(&ValidationError::EmailInvalid));
    assert_eq!(errors.get("password"), Some(&ValidationError::PasswordTooShort));
  }
}
