use rocket::Route;

mod question;
mod results;
mod vote;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(question::routes());
    routes.extend(vote::routes());
    routes.extend(results::routes());
    routes
}
