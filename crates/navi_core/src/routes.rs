//! Screen routes and the authentication guard.
//!
//! Sign-in and sign-up are public; everything else needs a signed-in user.
//! Unknown paths land on the home screen.

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    SignIn,
    SignUp,
    Home,
    Lists,
    Notes,
}

impl Route {
    pub const ALL: [Route; 5] = [
        Route::SignIn,
        Route::SignUp,
        Route::Home,
        Route::Lists,
        Route::Notes,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Self::SignIn => "/signin",
            Self::SignUp => "/signup",
            Self::Home => "/",
            Self::Lists => "/lists",
            Self::Notes => "/notes",
        }
    }

    /// Maps a path to its route. Query strings, fragments and a trailing
    /// slash are ignored.
    pub fn parse(path: &str) -> Self {
        let path = path
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim();
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        Self::ALL
            .into_iter()
            .find(|route| route.path() == path)
            .unwrap_or(Self::Home)
    }

    pub fn is_public(self) -> bool {
        matches!(self, Self::SignIn | Self::SignUp)
    }

    /// Where a request for `self` actually lands.
    pub fn resolve(self, authenticated: bool) -> Self {
        match (self.is_public(), authenticated) {
            (true, true) => Self::Home,
            (false, false) => Self::SignIn,
            _ => self,
        }
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::Route;

    #[test]
    fn parses_known_and_unknown_paths() {
        assert_eq!(Route::parse("/lists"), Route::Lists);
        assert_eq!(Route::parse("/notes/?tab=archived"), Route::Notes);
        assert_eq!(Route::parse(""), Route::Home);
        assert_eq!(Route::parse("/settings"), Route::Home);
    }

    #[test]
    fn guard_redirects_by_auth_state() {
        assert_eq!(Route::Lists.resolve(false), Route::SignIn);
        assert_eq!(Route::SignUp.resolve(true), Route::Home);
        assert_eq!(Route::SignUp.resolve(false), Route::SignUp);
        assert_eq!(Route::Notes.resolve(true), Route::Notes);
    }
}
