use futures::stream;
use mock_exchange::cookies::Cookie;
use mock_exchange::request::{MULTIPART_BOUNDARY, MULTIPART_CONTENT_TYPE};
use mock_exchange::{BodyChannel, Exchange, MockError};
use std::io::Read;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct Part {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

async fn parse_multipart(body: Vec<u8>) -> Vec<Part> {
    let chunks = stream::iter(vec![Ok::<_, std::io::Error>(body)]);
    let mut multipart = multer::Multipart::new(chunks, MULTIPART_BOUNDARY);
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(ToString::to_string);
        let content_type = field.content_type().map(ToString::to_string);
        let data = field.bytes().await.unwrap().to_vec();
        parts.push(Part {
            name,
            file_name,
            content_type,
            data,
        });
    }
    parts
}

#[tokio::test]
async fn uploaded_file_round_trips_through_a_multipart_parser() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let fixture = dir.path().join("test-file.txt");
    let content = b"This is a test file.\r\nWith CRLF and \x00 bytes.\n".to_vec();
    std::fs::write(&fixture, &content).unwrap();

    let mut exchange = Exchange::new();
    let request = exchange.request_mut();
    request.set_post(true);
    request.add_parameter("test", "test");
    request.add_file("file", &fixture, "text/plain").unwrap();
    assert_eq!(request.content_type(), Some(MULTIPART_CONTENT_TYPE));

    let body = request.open_stream().unwrap().read_remaining().unwrap();
    assert_eq!(request.content_length(), Some(body.len() as u64));

    let parts = parse_multipart(body).await;
    assert_eq!(parts.len(), 2);

    assert_eq!(parts[0].name, "test");
    assert_eq!(parts[0].data, b"test");
    assert!(parts[0].file_name.is_none());
    assert!(parts[0].content_type.is_none());

    assert_eq!(parts[1].name, "file");
    assert_eq!(parts[1].file_name.as_deref(), Some("test-file.txt"));
    assert_eq!(parts[1].content_type.as_deref(), Some("text/plain"));

    let written = dir.path().join("written.txt");
    std::fs::write(&written, &parts[1].data).unwrap();
    assert_eq!(std::fs::read(&written).unwrap(), content);
}

#[tokio::test]
async fn many_fields_and_files_keep_fields_first() {
    let dir = tempfile::tempdir().unwrap();
    let mut exchange = Exchange::new();
    let request = exchange.request_mut();

    let mut expected_files = Vec::new();
    for i in 0..3 {
        let path = dir.path().join(format!("file-{i}.bin"));
        let data: Vec<u8> = (0..(i * 100 + 1)).map(|b| (b % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();
        request
            .add_file(format!("upload{i}"), &path, "application/octet-stream")
            .unwrap();
        request.add_parameter(format!("field{i}"), format!("value {i}"));
        request.add_parameter(format!("field{i}"), format!("again {i}"));
        expected_files.push(data);
    }

    let body = request.open_stream().unwrap().read_remaining().unwrap();
    let parts = parse_multipart(body).await;
    assert_eq!(parts.len(), 6 + 3);

    for (i, part) in parts[..6].iter().enumerate() {
        assert_eq!(part.name, format!("field{}", i / 2));
        assert!(part.file_name.is_none());
    }
    for (i, part) in parts[6..].iter().enumerate() {
        assert_eq!(part.name, format!("upload{i}"));
        assert_eq!(part.file_name.as_deref(), Some(format!("file-{i}.bin").as_str()));
        assert_eq!(part.data, expected_files[i]);
    }
}

#[test]
fn body_channels_are_single_use() {
    let mut exchange = Exchange::new();
    let request = exchange.request_mut();
    request.set_body("0123456789").unwrap();

    let mut head = [0u8; 4];
    request.open_stream().unwrap().read_exact(&mut head).unwrap();
    let tail = request.open_stream().unwrap().read_remaining().unwrap();
    assert_eq!(&head, b"0123");
    assert_eq!(tail, b"456789");

    let err = request.open_reader().unwrap_err();
    assert!(matches!(
        err,
        MockError::AlreadyConsumed {
            opened: BodyChannel::Stream
        }
    ));
    assert_eq!(request.body_channel(), Some(BodyChannel::Stream));
}

#[test]
fn cookie_flow_across_hosts_and_paths() {
    init_logger();
    let mut exchange = Exchange::new();

    // Step 1: localhost sets a token.
    exchange
        .run(|req, resp| {
            assert!(req.cookies().is_empty());
            resp.add_cookie(Cookie::new("token", "secret"));
            Ok(())
        })
        .unwrap();

    // Step 2: the admin console on fusionauth.io starts a session.
    let req = exchange.next_request("/admin");
    req.set_server_name("fusionauth.io");
    req.set_server_port(80);
    assert!(req.cookies().is_empty());
    exchange
        .run(|_req, resp| {
            resp.add_header("Set-Cookie", "JSESSIONID=12345; HttpOnly");
            Ok(())
        })
        .unwrap();

    // Step 3: the login page sets a path-scoped preference.
    let req = exchange.next_request("/login");
    req.set_server_name("fusionauth.io");
    req.set_server_port(80);
    assert_eq!(names(&req.cookies()), vec!["JSESSIONID"]);
    exchange
        .run(|_req, resp| {
            resp.add_cookie(Cookie::new("preferences", "42").with_path("/admin"));
            Ok(())
        })
        .unwrap();

    // The login page does not see the admin-scoped preference.
    assert_eq!(names(&exchange.request().cookies()), vec!["JSESSIONID"]);

    // The admin page sees both.
    let req = exchange.next_request("/admin/users");
    req.set_server_name("fusionauth.io");
    req.set_server_port(80);
    assert_eq!(names(&req.cookies()), vec!["JSESSIONID", "preferences"]);

    // localhost still only has its token.
    let req = exchange.next_request("/");
    assert_eq!(names(&req.cookies()), vec!["token"]);

    // Deleting the session cookie removes it for every later request.
    let req = exchange.next_request("/admin");
    req.set_server_name("fusionauth.io");
    req.set_server_port(80);
    exchange
        .run(|_req, resp| {
            resp.add_header("Set-Cookie", "JSESSIONID=; Max-Age=0");
            Ok(())
        })
        .unwrap();
    let req = exchange.next_request("/admin/users");
    req.set_server_name("fusionauth.io");
    req.set_server_port(80);
    assert_eq!(names(&req.cookies()), vec!["preferences"]);

    exchange.user_agent().reset();
    assert!(exchange.request().cookies().is_empty());
}

#[test]
fn redirects_and_headers_export() {
    let mut exchange = Exchange::new();
    exchange.request_mut().set_uri("/oauth2/authorize");
    exchange
        .run(|req, resp| {
            let state = req.parameter("state").unwrap_or("none").to_string();
            resp.send_redirect(&format!("callback?state={state}"))?;
            Ok(())
        })
        .unwrap();

    let response = exchange.response();
    assert_eq!(response.status(), http::StatusCode::FOUND);
    assert_eq!(
        response.redirect(),
        Some("http://localhost:10000/oauth2/callback?state=none")
    );
    let headers = response.header_map().unwrap();
    assert_eq!(
        headers.get(http::header::LOCATION).unwrap(),
        "http://localhost:10000/oauth2/callback?state=none"
    );

    let request_headers = exchange.request().header_map().unwrap();
    assert_eq!(request_headers.get(http::header::USER_AGENT).unwrap(), "Prime-Mock");
}

fn names(cookies: &[Cookie]) -> Vec<&str> {
    cookies.iter().map(|c| c.name.as_str()).collect()
}
