use std::collections::HashMap;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Local HTTP server answering fixed routes, keyed by path plus query.
pub struct TestServer {
    pub base_url: String,
    shutdown: mpsc::Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl TestServer {
    pub fn spawn(routes: Vec<(&'static str, u16, Vec<u8>)>) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
        let base_url = format!("http://{}", server.server_addr());
        let routes = routes
            .into_iter()
            .map(|(path, status, body)| (path.to_string(), (status, body)))
            .collect::<HashMap<_, _>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }
                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };
                let (status, body) = routes
                    .get(request.url())
                    .cloned()
                    .unwrap_or((404, b"not found".to_vec()));
                let _ = request.respond(tiny_http::Response::from_data(body).with_status_code(status));
            }
        });

        Self {
            base_url,
            shutdown: shutdown_tx,
            handle: Some(handle),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
