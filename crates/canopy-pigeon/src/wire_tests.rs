#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::net::{TcpListener, TcpStream};

    use crate::wire::{read_json, write_json, PigeonRequest, PigeonResponse};

    #[tokio::test]
    async fn request_round_trips_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request: PigeonRequest = read_json(&mut stream).await.unwrap();
            assert_eq!(request.key, "device:abc");
            let response = PigeonResponse::ok(
                json!({"result": "ok"}).as_object().unwrap().clone(),
            );
            write_json(&mut stream, &response).await.unwrap();
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        let request = PigeonRequest {
            key: "device:abc".to_string(),
            body: json!({"cmd": "reboot"}).as_object().unwrap().clone(),
        };
        write_json(&mut client, &request).await.unwrap();
        let response: PigeonResponse = read_json(&mut client).await.unwrap();
        assert!(response.err.is_none());
        assert_eq!(response.body.get("result").unwrap(), "ok");

        server.await.unwrap();
    }
}
