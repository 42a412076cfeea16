//! HTML templates for the web interface.
//!
//! The viewer renders whole frames pushed from `/display/ws`: one image at a
//! time, blanked while hidden, with an overlay for error dialogs.

/// Full-screen viewer page
pub const VIEWER_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Sparky Screen</title>
    <style>
        html, body {
            margin: 0;
            height: 100%;
            background: #000;
            overflow: hidden;
            cursor: none;
        }
        body.hide #frame { visibility: hidden; }
        #frame {
            width: 100%;
            height: 100%;
            object-fit: contain;
        }
        #frame:not([src]) { display: none; }
        #dialog {
            position: absolute;
            inset: 0;
            display: none;
            align-items: center;
            justify-content: center;
            color: #fff;
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            font-size: 1.5rem;
            text-align: center;
            padding: 2rem;
        }
        #dialog.open { display: flex; }
        #dialog.channel_closed { background: #5a1010; }
    </style>
</head>
<body>
    <img id="frame" alt="">
    <div id="dialog"></div>
    <script>
        const frameImg = document.getElementById('frame');
        const dialog = document.getElementById('dialog');

        // Apply a whole frame; the image source swaps in one step.
        function render(frame) {
            document.body.classList.toggle('hide', frame.hidden);

            if (frame.src) {
                if (frameImg.getAttribute('src') !== frame.src) {
                    frameImg.setAttribute('src', frame.src);
                }
            } else {
                frameImg.removeAttribute('src');
            }

            if (frame.dialog) {
                dialog.textContent = frame.dialog.message;
                dialog.className = 'open ' + frame.dialog.kind;
            } else {
                dialog.className = '';
            }
        }

        function connect() {
            const scheme = location.protocol === 'https:' ? 'wss' : 'ws';
            const socket = new WebSocket(scheme + '://' + location.host + '/display/ws');
            socket.onmessage = (event) => {
                try {
                    render(JSON.parse(event.data));
                } catch (e) {
                    console.error('Bad frame from server', e);
                }
            };
            socket.onclose = () => {
                render({
                    hidden: false,
                    src: null,
                    dialog: {
                        kind: 'channel_closed',
                        message: 'Lost connection to the frame controller. Restart the frame.'
                    }
                });
            };
        }

        window.addEventListener('DOMContentLoaded', connect);
    </script>
</body>
</html>
"#;
