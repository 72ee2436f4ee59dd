// Route preparation: maps every node in the store to a renderable route.

use crate::node::Node;
use crate::store::Store;
use serde::Serialize;

/// A page route derived from a node. `path` is the node's own path when set,
/// otherwise `/{type}/{slug}` with the slug falling back to a slugified
/// title or the node id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub path: String,
    pub type_name: String,
    pub node_id: String,
}

pub fn prepare_routes(store: &Store) -> Vec<Route> {
    let mut routes = Vec::new();

    for collection in store.collections() {
        for node in collection.iter() {
            routes.push(Route {
                path: route_path(collection.type_name(), node),
                type_name: collection.type_name().to_string(),
                node_id: node.id.clone(),
            });
        }
    }

    routes
}

fn route_path(type_name: &str, node: &Node) -> String {
    if let Some(path) = &node.path {
        return path.clone();
    }

    let slug = node
        .slug
        .clone()
        .or_else(|| node.title.as_deref().map(slug::slugify))
        .unwrap_or_else(|| slug::slugify(&node.id));

    format!("/{}/{}", slug::slugify(type_name), slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use crate::schema::ContentType;

    #[test]
    fn explicit_paths_win_and_slugs_fall_back_to_titles() {
        let mut store = Store::new();
        let posts = store.add_collection(ContentType::new("BlogPost")).unwrap();

        posts
            .insert(Node::new("BlogPost", "p1").with_path("/custom/path"))
            .unwrap();
        posts
            .insert(Node::new("BlogPost", "p2").with_title("Hello World"))
            .unwrap();
        posts
            .insert(Node::new("BlogPost", "p3").with_slug("explicit-slug"))
            .unwrap();
        posts.insert(Node::new("BlogPost", "p4")).unwrap();

        let routes = prepare_routes(&store);
        let paths: Vec<&str> = routes.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "/custom/path",
                "/blog-post/hello-world",
                "/blog-post/explicit-slug",
                "/blog-post/p4",
            ]
        );
    }
}
